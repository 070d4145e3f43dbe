//! Monthly and geographic statistics storage

use birdrace_common::db::{GeographicStat, MonthlyStat};
use birdrace_common::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Replace a user's stored statistics
///
/// Monthly rows are replaced for `year` only. Geographic rows are replaced
/// wholesale for the user. Both happen in one transaction.
pub async fn replace_user_stats(
    pool: &SqlitePool,
    user_id: Uuid,
    year: i32,
    monthly: &[MonthlyStat],
    geographic: &[GeographicStat],
) -> Result<()> {
    let user = user_id.to_string();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM monthly_stats WHERE user_id = ? AND year = ?")
        .bind(&user)
        .bind(year)
        .execute(&mut *tx)
        .await?;

    for stat in monthly {
        sqlx::query(
            r#"
            INSERT INTO monthly_stats
                (user_id, year, month, species_count, new_species_count, total_observations, calculated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user)
        .bind(stat.year)
        .bind(stat.month)
        .bind(stat.species_count)
        .bind(stat.new_species_count)
        .bind(stat.total_observations)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM geographic_stats WHERE user_id = ?")
        .bind(&user)
        .execute(&mut *tx)
        .await?;

    for stat in geographic {
        sqlx::query(
            r#"
            INSERT INTO geographic_stats
                (user_id, state_province, county, species_count, first_observation, last_observation)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user)
        .bind(&stat.state_province)
        .bind(&stat.county)
        .bind(stat.species_count)
        .bind(stat.first_observation)
        .bind(stat.last_observation)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Stored monthly statistics for a user and year, January first
pub async fn load_monthly_stats(
    pool: &SqlitePool,
    user_id: Uuid,
    year: i32,
) -> Result<Vec<MonthlyStat>> {
    let rows = sqlx::query(
        r#"
        SELECT year, month, species_count, new_species_count, total_observations
        FROM monthly_stats
        WHERE user_id = ? AND year = ?
        ORDER BY month
        "#,
    )
    .bind(user_id.to_string())
    .bind(year)
    .fetch_all(pool)
    .await?;

    let mut stats = Vec::with_capacity(rows.len());
    for row in &rows {
        stats.push(MonthlyStat {
            year: row.try_get("year")?,
            month: row.try_get("month")?,
            species_count: row.try_get("species_count")?,
            new_species_count: row.try_get("new_species_count")?,
            total_observations: row.try_get("total_observations")?,
        });
    }

    Ok(stats)
}

/// Stored geographic statistics for a user, ordered by state then county
pub async fn load_geographic_stats(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<GeographicStat>> {
    let rows = sqlx::query(
        r#"
        SELECT state_province, county, species_count, first_observation, last_observation
        FROM geographic_stats
        WHERE user_id = ?
        ORDER BY state_province, county
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut stats = Vec::with_capacity(rows.len());
    for row in &rows {
        stats.push(GeographicStat {
            state_province: row.try_get("state_province")?,
            county: row.try_get("county")?,
            species_count: row.try_get("species_count")?,
            first_observation: row.try_get("first_observation")?,
            last_observation: row.try_get("last_observation")?,
        });
    }

    Ok(stats)
}
