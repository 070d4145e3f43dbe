//! Database models

use crate::species;
use crate::Error;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Who can see a participant's results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    /// Listed on the leaderboard with full species list
    #[default]
    Public,
    /// Listed on the leaderboard; species list hides locations
    CountsOnly,
    /// Hidden everywhere
    Private,
}

impl PrivacyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "public",
            PrivacyLevel::CountsOnly => "counts_only",
            PrivacyLevel::Private => "private",
        }
    }
}

impl FromStr for PrivacyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(PrivacyLevel::Public),
            "counts_only" => Ok(PrivacyLevel::CountsOnly),
            "private" => Ok(PrivacyLevel::Private),
            other => Err(Error::InvalidInput(format!("Invalid privacy level: {}", other))),
        }
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant account. Login token columns are never loaded into this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub privacy_level: PrivacyLevel,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Normalized observation ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub user_id: Uuid,
    pub submission_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub taxonomic_order: Option<i64>,
    /// Free text: eBird uses "X" for present-but-uncounted
    pub count: Option<String>,
    pub state_province: Option<String>,
    pub county: Option<String>,
    pub location_id: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub observation_date: NaiveDate,
    pub observation_time: Option<NaiveTime>,
    pub protocol: Option<String>,
    pub duration_min: Option<i64>,
    pub all_obs_reported: bool,
    pub distance_traveled_km: Option<f64>,
    pub area_covered_ha: Option<f64>,
    pub num_observers: Option<i64>,
    pub breeding_code: Option<String>,
    pub observation_details: Option<String>,
    pub checklist_comments: Option<String>,
    pub ml_catalog_numbers: Option<String>,
}

impl NewObservation {
    /// Whether this record counts toward the competition
    pub fn is_countable(&self) -> bool {
        species::is_countable(&self.common_name)
    }
}

/// Stored observation as listed back to its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub submission_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub count: Option<String>,
    pub state_province: Option<String>,
    pub county: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub observation_date: NaiveDate,
    pub observation_time: Option<NaiveTime>,
    pub countable: bool,
}

/// Monthly rollup for one user and year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyStat {
    pub year: i32,
    pub month: u32,
    /// Distinct species seen through the end of this month
    pub species_count: i64,
    /// Species first seen this month
    pub new_species_count: i64,
    /// Observation rows dated this month
    pub total_observations: i64,
}

/// Per state/county rollup for one user. A missing county is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographicStat {
    pub state_province: String,
    pub county: String,
    pub species_count: i64,
    pub first_observation: NaiveDate,
    pub last_observation: NaiveDate,
}

/// One leaderboard row of the species summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSummary {
    pub year: i32,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub privacy_level: PrivacyLevel,
    pub species_count: i64,
    pub last_observation_date: Option<NaiveDate>,
    pub last_upload_date: Option<DateTime<Utc>>,
}
