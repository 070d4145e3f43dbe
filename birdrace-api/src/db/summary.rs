//! Species summary (leaderboard snapshot)

use birdrace_common::db::SpeciesSummary;
use birdrace_common::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{parse_guid, year_bounds};

/// Rebuild the summary rows for `year`
///
/// Every user gets a row, zero species included. Delete and re-insert run
/// inside one transaction so readers see either the old or the new snapshot.
pub async fn refresh_species_summary(pool: &SqlitePool, year: i32) -> Result<u64> {
    let (start, end) = year_bounds(year)?;
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM species_summary WHERE year = ?")
        .bind(year)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(
        r#"
        INSERT INTO species_summary (
            year, user_id, user_name, user_email, privacy_level,
            species_count, last_observation_date, last_upload_date, refreshed_at
        )
        SELECT ?, u.guid, u.name, u.email, u.privacy_level,
               COUNT(DISTINCT o.scientific_name),
               MAX(o.observation_date),
               MAX(o.uploaded_at),
               ?
        FROM users u
        LEFT JOIN observations o
               ON o.user_id = u.guid
              AND o.countable = 1
              AND o.observation_date >= ? AND o.observation_date < ?
        GROUP BY u.guid
        "#,
    )
    .bind(year)
    .bind(Utc::now())
    .bind(start)
    .bind(end)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    debug!("Refreshed species summary for {}: {} rows", year, result.rows_affected());

    Ok(result.rows_affected())
}

fn summary_from_row(row: &SqliteRow) -> Result<SpeciesSummary> {
    let user_id: String = row.try_get("user_id")?;
    let privacy: String = row.try_get("privacy_level")?;

    Ok(SpeciesSummary {
        year: row.try_get("year")?,
        user_id: parse_guid(&user_id)?,
        user_name: row.try_get("user_name")?,
        user_email: row.try_get("user_email")?,
        privacy_level: privacy.parse()?,
        species_count: row.try_get("species_count")?,
        last_observation_date: row.try_get("last_observation_date")?,
        last_upload_date: row.try_get("last_upload_date")?,
    })
}

const SUMMARY_COLUMNS: &str = "year, user_id, user_name, user_email, privacy_level, \
     species_count, last_observation_date, last_upload_date";

/// All summary rows for a year, unordered
pub async fn load_summary(pool: &SqlitePool, year: i32) -> Result<Vec<SpeciesSummary>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM species_summary WHERE year = ?",
        SUMMARY_COLUMNS
    ))
    .bind(year)
    .fetch_all(pool)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

/// One user's summary row for a year
pub async fn load_user_summary(
    pool: &SqlitePool,
    year: i32,
    user_id: Uuid,
) -> Result<Option<SpeciesSummary>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM species_summary WHERE year = ? AND user_id = ?",
        SUMMARY_COLUMNS
    ))
    .bind(year)
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(summary_from_row).transpose()
}
