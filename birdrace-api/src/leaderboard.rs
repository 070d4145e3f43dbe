//! Leaderboard ranking and public per-user views
//!
//! Everything here is pure: callers load [`SpeciesSummary`] rows or
//! sightings from the database and hand them in.

use birdrace_common::db::{MonthlyStat, PrivacyLevel, SpeciesSummary};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::aggregates::Sighting;

/// Default number of leaderboard entries
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest accepted leaderboard limit
pub const MAX_LIMIT: i64 = 500;

/// Shown in place of locations for `counts_only` participants
pub const COUNTS_ONLY_MESSAGE: &str =
    "This birder shares species and dates only; locations are hidden.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: Uuid,
    pub name: String,
    pub species_count: i64,
    pub last_observation_date: Option<NaiveDate>,
    pub privacy_level: PrivacyLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    /// Non-private participants, independent of `limit`
    pub participants: i64,
    pub entries: Vec<LeaderboardEntry>,
}

fn leaderboard_order(a: &SpeciesSummary, b: &SpeciesSummary) -> Ordering {
    b.species_count
        .cmp(&a.species_count)
        .then_with(|| match (a.last_observation_date, b.last_observation_date) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// Rank summary rows
///
/// Private participants are dropped before counting and ranking. Ranks are
/// 1-based output positions, so equal species counts still get distinct ranks.
pub fn rank(rows: Vec<SpeciesSummary>, limit: usize) -> Leaderboard {
    let mut visible: Vec<SpeciesSummary> = rows
        .into_iter()
        .filter(|row| row.privacy_level != PrivacyLevel::Private)
        .collect();
    visible.sort_by(leaderboard_order);

    let participants = visible.len() as i64;
    let entries = visible
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i as i64 + 1,
            user_id: row.user_id,
            name: row.user_name,
            species_count: row.species_count,
            last_observation_date: row.last_observation_date,
            privacy_level: row.privacy_level,
        })
        .collect();

    Leaderboard {
        participants,
        entries,
    }
}

/// Ordering of a public species list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeciesSort {
    /// Alphabetical by common name
    #[default]
    Name,
    /// Chronological by first observation
    Date,
}

impl FromStr for SpeciesSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SpeciesSort::Name),
            "date" => Ok(SpeciesSort::Date),
            other => Err(format!("Invalid sort '{}': expected 'name' or 'date'", other)),
        }
    }
}

/// First sighting of one species
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicSpeciesEntry {
    pub common_name: String,
    pub scientific_name: String,
    pub first_observation_date: NaiveDate,
    pub state_province: Option<String>,
}

/// First sighting of every species in `sightings`, keyed by scientific name
///
/// Expects sightings oldest first (as loaded); the earliest one wins either way.
pub fn first_sightings(sightings: &[Sighting]) -> Vec<PublicSpeciesEntry> {
    let mut first: HashMap<&str, &Sighting> = HashMap::new();

    for sighting in sightings {
        first
            .entry(sighting.scientific_name.as_str())
            .and_modify(|current| {
                if sighting.observation_date < current.observation_date {
                    *current = sighting;
                }
            })
            .or_insert(sighting);
    }

    first
        .into_values()
        .map(|s| PublicSpeciesEntry {
            common_name: s.common_name.clone(),
            scientific_name: s.scientific_name.clone(),
            first_observation_date: s.observation_date,
            state_province: s.state_province.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicSpeciesList {
    pub user_id: Uuid,
    pub user_name: String,
    pub privacy_level: PrivacyLevel,
    pub species_count: i64,
    pub species: Vec<PublicSpeciesEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Build the species list a participant shows to the public
///
/// Returns `None` for private participants so callers can answer exactly
/// as they would for an unknown user.
pub fn public_species_list(
    user_id: Uuid,
    user_name: &str,
    privacy_level: PrivacyLevel,
    sightings: &[Sighting],
    sort: SpeciesSort,
) -> Option<PublicSpeciesList> {
    let mut species = first_sightings(sightings);
    let mut message = None;

    match privacy_level {
        PrivacyLevel::Private => return None,
        PrivacyLevel::CountsOnly => {
            for entry in &mut species {
                entry.state_province = None;
            }
            message = Some(COUNTS_ONLY_MESSAGE.to_string());
        }
        PrivacyLevel::Public => {}
    }

    match sort {
        SpeciesSort::Name => species.sort_by(|a, b| {
            a.common_name
                .cmp(&b.common_name)
                .then_with(|| a.scientific_name.cmp(&b.scientific_name))
        }),
        SpeciesSort::Date => species.sort_by(|a, b| {
            a.first_observation_date
                .cmp(&b.first_observation_date)
                .then_with(|| a.common_name.cmp(&b.common_name))
        }),
    }

    Some(PublicSpeciesList {
        user_id,
        user_name: user_name.to_string(),
        privacy_level,
        species_count: species.len() as i64,
        species,
        message,
    })
}

/// One point of a participant's monthly progress chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyProgress {
    /// `YYYY-MM`
    pub month: String,
    pub species_count: i64,
    pub new_species: i64,
}

/// Label stored monthly stats for charting
pub fn monthly_progress(stats: &[MonthlyStat]) -> Vec<MonthlyProgress> {
    stats
        .iter()
        .map(|stat| MonthlyProgress {
            month: format!("{:04}-{:02}", stat.year, stat.month),
            species_count: stat.species_count,
            new_species: stat.new_species_count,
        })
        .collect()
}
