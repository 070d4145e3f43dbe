//! Per-user aggregate recomputation
//!
//! Monthly and geographic statistics are pure functions of a user's
//! countable sightings. [`recompute`] loads the sightings, stores the
//! derived rows, then refreshes the leaderboard snapshot for the year.

use birdrace_common::db::{GeographicStat, MonthlyStat};
use birdrace_common::Result;
use chrono::{Datelike, NaiveDate};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashSet};
use tracing::info;
use uuid::Uuid;

use crate::db;

/// The fields of a countable observation that aggregates depend on
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub common_name: String,
    pub scientific_name: String,
    pub state_province: Option<String>,
    pub county: Option<String>,
    pub observation_date: NaiveDate,
}

/// Monthly statistics for every month of `year` that has a sighting
///
/// `species_count` is cumulative through the end of the month, so it never
/// decreases from one month to the next. Sightings outside `year` are ignored.
pub fn monthly_stats(year: i32, sightings: &[Sighting]) -> Vec<MonthlyStat> {
    let mut by_month: BTreeMap<u32, Vec<&Sighting>> = BTreeMap::new();
    for sighting in sightings.iter().filter(|s| s.observation_date.year() == year) {
        by_month
            .entry(sighting.observation_date.month())
            .or_default()
            .push(sighting);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut stats = Vec::with_capacity(by_month.len());

    for (month, month_sightings) in by_month {
        let mut new_species = 0;
        for sighting in &month_sightings {
            if seen.insert(sighting.scientific_name.as_str()) {
                new_species += 1;
            }
        }

        stats.push(MonthlyStat {
            year,
            month,
            species_count: seen.len() as i64,
            new_species_count: new_species,
            total_observations: month_sightings.len() as i64,
        });
    }

    stats
}

/// Geographic statistics per (state/province, county)
///
/// Sightings without a state are skipped. A missing county groups under "".
pub fn geographic_stats(sightings: &[Sighting]) -> Vec<GeographicStat> {
    struct Bucket<'a> {
        species: HashSet<&'a str>,
        first: NaiveDate,
        last: NaiveDate,
    }

    let mut buckets: BTreeMap<(&str, &str), Bucket> = BTreeMap::new();

    for sighting in sightings {
        let state = match sighting.state_province.as_deref() {
            Some(state) if !state.is_empty() => state,
            _ => continue,
        };
        let county = sighting.county.as_deref().unwrap_or("");
        let date = sighting.observation_date;

        let bucket = buckets.entry((state, county)).or_insert_with(|| Bucket {
            species: HashSet::new(),
            first: date,
            last: date,
        });
        bucket.species.insert(sighting.scientific_name.as_str());
        bucket.first = bucket.first.min(date);
        bucket.last = bucket.last.max(date);
    }

    buckets
        .into_iter()
        .map(|((state, county), bucket)| GeographicStat {
            state_province: state.to_string(),
            county: county.to_string(),
            species_count: bucket.species.len() as i64,
            first_observation: bucket.first,
            last_observation: bucket.last,
        })
        .collect()
}

/// Recompute a user's statistics for `year` and refresh the species summary
pub async fn recompute(pool: &SqlitePool, user_id: Uuid, year: i32) -> Result<()> {
    let sightings = db::observations::load_countable_sightings(pool, user_id, year).await?;

    let monthly = monthly_stats(year, &sightings);
    let geographic = geographic_stats(&sightings);

    db::stats::replace_user_stats(pool, user_id, year, &monthly, &geographic).await?;
    db::summary::refresh_species_summary(pool, year).await?;

    info!(
        "Recomputed stats for user {} ({}): {} months, {} regions",
        user_id,
        year,
        monthly.len(),
        geographic.len()
    );

    Ok(())
}
