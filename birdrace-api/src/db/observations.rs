//! Observation database operations

use birdrace_common::db::{NewObservation, Observation};
use birdrace_common::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::year_bounds;
use crate::aggregates::Sighting;

/// Result of inserting one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Natural key already present for this user
    Duplicate,
}

/// Insert one observation
///
/// A natural-key collision is reported as `Duplicate`, never as an error.
pub async fn insert_observation(
    pool: &SqlitePool,
    obs: &NewObservation,
    uploaded_at: DateTime<Utc>,
) -> Result<InsertOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO observations (
            user_id, submission_id, common_name, scientific_name, taxonomic_order,
            count, state_province, county, location_id, location,
            latitude, longitude, observation_date, observation_time, protocol,
            duration_min, all_obs_reported, distance_traveled_km, area_covered_ha,
            num_observers, breeding_code, observation_details, checklist_comments,
            ml_catalog_numbers, countable, uploaded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(obs.user_id.to_string())
    .bind(&obs.submission_id)
    .bind(&obs.common_name)
    .bind(&obs.scientific_name)
    .bind(obs.taxonomic_order)
    .bind(&obs.count)
    .bind(&obs.state_province)
    .bind(&obs.county)
    .bind(&obs.location_id)
    .bind(&obs.location)
    .bind(obs.latitude)
    .bind(obs.longitude)
    .bind(obs.observation_date)
    .bind(obs.observation_time)
    .bind(&obs.protocol)
    .bind(obs.duration_min)
    .bind(obs.all_obs_reported)
    .bind(obs.distance_traveled_km)
    .bind(obs.area_covered_ha)
    .bind(obs.num_observers)
    .bind(&obs.breeding_code)
    .bind(&obs.observation_details)
    .bind(&obs.checklist_comments)
    .bind(&obs.ml_catalog_numbers)
    .bind(obs.is_countable())
    .bind(uploaded_at)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(InsertOutcome::Duplicate)
        }
        Err(e) => Err(Error::Database(e)),
    }
}

fn observation_from_row(row: &SqliteRow) -> Result<Observation> {
    Ok(Observation {
        id: row.try_get("id")?,
        submission_id: row.try_get("submission_id")?,
        common_name: row.try_get("common_name")?,
        scientific_name: row.try_get("scientific_name")?,
        count: row.try_get("count")?,
        state_province: row.try_get("state_province")?,
        county: row.try_get("county")?,
        location: row.try_get("location")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        observation_date: row.try_get("observation_date")?,
        observation_time: row.try_get("observation_time")?,
        countable: row.try_get("countable")?,
    })
}

/// One page of a user's observations for a year, newest first
///
/// Returns the page and the total number of matching rows.
pub async fn list_observations(
    pool: &SqlitePool,
    user_id: Uuid,
    year: i32,
    state_province: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Observation>, i64)> {
    let (start, end) = year_bounds(year)?;
    let user = user_id.to_string();

    let rows = sqlx::query(
        r#"
        SELECT id, submission_id, common_name, scientific_name, count,
               state_province, county, location, latitude, longitude,
               observation_date, observation_time, countable
        FROM observations
        WHERE user_id = ?
          AND observation_date >= ? AND observation_date < ?
          AND (? IS NULL OR state_province = ?)
        ORDER BY observation_date DESC, observation_time DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(&user)
    .bind(start)
    .bind(end)
    .bind(state_province)
    .bind(state_province)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM observations
        WHERE user_id = ?
          AND observation_date >= ? AND observation_date < ?
          AND (? IS NULL OR state_province = ?)
        "#,
    )
    .bind(&user)
    .bind(start)
    .bind(end)
    .bind(state_province)
    .bind(state_province)
    .fetch_one(pool)
    .await?;

    let observations = rows
        .iter()
        .map(observation_from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok((observations, total))
}

/// Number of stored observation rows (countable or not) for a user and year
pub async fn count_observations(pool: &SqlitePool, user_id: Uuid, year: i32) -> Result<i64> {
    let (start, end) = year_bounds(year)?;

    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM observations
        WHERE user_id = ? AND observation_date >= ? AND observation_date < ?
        "#,
    )
    .bind(user_id.to_string())
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Countable observations of a user within a year, oldest first
pub async fn load_countable_sightings(
    pool: &SqlitePool,
    user_id: Uuid,
    year: i32,
) -> Result<Vec<Sighting>> {
    let (start, end) = year_bounds(year)?;

    let rows = sqlx::query(
        r#"
        SELECT common_name, scientific_name, state_province, county, observation_date
        FROM observations
        WHERE user_id = ? AND countable = 1
          AND observation_date >= ? AND observation_date < ?
        ORDER BY observation_date, id
        "#,
    )
    .bind(user_id.to_string())
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut sightings = Vec::with_capacity(rows.len());
    for row in &rows {
        let observation_date: NaiveDate = row.try_get("observation_date")?;
        sightings.push(Sighting {
            common_name: row.try_get("common_name")?,
            scientific_name: row.try_get("scientific_name")?,
            state_province: row.try_get("state_province")?,
            county: row.try_get("county")?,
            observation_date,
        });
    }

    Ok(sightings)
}

/// Number of distinct states/provinces with a countable sighting in the year
pub async fn count_states_visited(pool: &SqlitePool, user_id: Uuid, year: i32) -> Result<i64> {
    let (start, end) = year_bounds(year)?;

    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT state_province) FROM observations
        WHERE user_id = ? AND countable = 1
          AND state_province IS NOT NULL AND state_province != ''
          AND observation_date >= ? AND observation_date < ?
        "#,
    )
    .bind(user_id.to_string())
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Distinct countable species per state/province within the year, ordered by state
pub async fn species_count_by_state(
    pool: &SqlitePool,
    user_id: Uuid,
    year: i32,
) -> Result<Vec<(String, i64)>> {
    let (start, end) = year_bounds(year)?;

    let rows = sqlx::query(
        r#"
        SELECT state_province, COUNT(DISTINCT scientific_name) AS species_count
        FROM observations
        WHERE user_id = ? AND countable = 1
          AND state_province IS NOT NULL AND state_province != ''
          AND observation_date >= ? AND observation_date < ?
        GROUP BY state_province
        ORDER BY state_province
        "#,
    )
    .bind(user_id.to_string())
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut counts: Vec<(String, i64)> = Vec::with_capacity(rows.len());
    for row in &rows {
        counts.push((row.try_get("state_province")?, row.try_get("species_count")?));
    }

    Ok(counts)
}
