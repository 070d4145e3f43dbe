//! eBird export row normalization
//!
//! Turns one raw CSV record into a [`NewObservation`]. Optional numeric
//! fields that fail to parse become `None` rather than zero.

use birdrace_common::db::NewObservation;
use chrono::{NaiveDate, NaiveTime};
use csv::StringRecord;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub const SUBMISSION_ID: &str = "Submission ID";
pub const COMMON_NAME: &str = "Common Name";
pub const SCIENTIFIC_NAME: &str = "Scientific Name";
pub const DATE: &str = "Date";
pub const STATE_PROVINCE: &str = "State/Province";

/// Columns every eBird export must carry
pub const REQUIRED_COLUMNS: &[&str] = &[SUBMISSION_ID, COMMON_NAME, SCIENTIFIC_NAME, DATE, STATE_PROVINCE];

/// Accepted `Date` formats, eBird's own first
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Why a row was skipped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
}

/// Header name to column position
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim_start_matches('\u{feff}').trim().to_string(), i))
            .collect();

        Self { positions }
    }

    /// Required columns absent from the header, sorted
    pub fn missing_required(&self) -> Vec<String> {
        let mut missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| !self.positions.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        missing.sort();
        missing
    }

    /// Trimmed field value; blank or absent columns yield `None`
    pub fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        let value = record.get(*self.positions.get(column)?)?.trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    fn text(&self, record: &StringRecord, column: &str) -> Option<String> {
        self.get(record, column).map(str::to_string)
    }

    fn float(&self, record: &StringRecord, column: &str) -> Option<f64> {
        self.get(record, column).and_then(|v| v.parse().ok())
    }

    fn integer(&self, record: &StringRecord, column: &str) -> Option<i64> {
        self.get(record, column).and_then(parse_integer)
    }
}

/// Parse a `Date` value. `Ok(None)` for blank input, `Err` for anything unparseable.
pub fn parse_date(value: &str) -> Result<Option<NaiveDate>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(Some)
        .ok_or_else(|| format!("unrecognized date '{}'", value))
}

/// Parse eBird's `"02:33 PM"` time of day
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%I:%M %p").ok()
}

/// `1`, `true` and `yes` (any case) are true; everything else is false
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Integer, also accepting integral floats such as `"3.0"`
fn parse_integer(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Build a [`NewObservation`] from one in-year record
///
/// `date` is the already-parsed `Date` column.
pub fn normalize(
    record: &StringRecord,
    columns: &ColumnIndex,
    user_id: Uuid,
    date: NaiveDate,
) -> Result<NewObservation, SkipReason> {
    let required = |column: &'static str| {
        columns
            .text(record, column)
            .ok_or(SkipReason::MissingField(column))
    };

    Ok(NewObservation {
        user_id,
        submission_id: required(SUBMISSION_ID)?,
        common_name: required(COMMON_NAME)?,
        scientific_name: required(SCIENTIFIC_NAME)?,
        taxonomic_order: columns.integer(record, "Taxonomic Order"),
        count: columns.text(record, "Count"),
        state_province: columns.text(record, STATE_PROVINCE),
        county: columns.text(record, "County"),
        location_id: columns.text(record, "Location ID"),
        location: columns.text(record, "Location"),
        latitude: columns.float(record, "Latitude"),
        longitude: columns.float(record, "Longitude"),
        observation_date: date,
        observation_time: columns.get(record, "Time").and_then(parse_time),
        protocol: columns.text(record, "Protocol"),
        duration_min: columns.integer(record, "Duration (Min)"),
        all_obs_reported: columns
            .get(record, "All Obs Reported")
            .map(parse_bool)
            .unwrap_or(false),
        distance_traveled_km: columns.float(record, "Distance Traveled (km)"),
        area_covered_ha: columns.float(record, "Area Covered (ha)"),
        num_observers: columns.integer(record, "Number of Observers"),
        breeding_code: columns.text(record, "Breeding Code"),
        observation_details: columns.text(record, "Observation Details"),
        checklist_comments: columns.text(record, "Checklist Comments"),
        ml_catalog_numbers: columns.text(record, "ML Catalog Numbers"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &[&str] = &[
        "Submission ID",
        "Common Name",
        "Scientific Name",
        "Taxonomic Order",
        "Count",
        "State/Province",
        "County",
        "Latitude",
        "Date",
        "Time",
        "Duration (Min)",
        "All Obs Reported",
    ];

    fn columns() -> ColumnIndex {
        ColumnIndex::from_headers(&StringRecord::from(HEADER.to_vec()))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
    }

    #[test]
    fn test_normalize_full_row() {
        let record = StringRecord::from(vec![
            " S100 ",
            "Northern Cardinal",
            "Cardinalis cardinalis",
            "21035",
            "X",
            "US-NY",
            "Kings",
            "40.66",
            "2026-04-02",
            "07:15 AM",
            "45",
            "1",
        ]);

        let obs = normalize(&record, &columns(), Uuid::nil(), date()).unwrap();
        assert_eq!(obs.submission_id, "S100");
        assert_eq!(obs.taxonomic_order, Some(21035));
        assert_eq!(obs.count.as_deref(), Some("X"));
        assert_eq!(obs.county.as_deref(), Some("Kings"));
        assert_eq!(obs.latitude, Some(40.66));
        assert_eq!(obs.observation_time, NaiveTime::from_hms_opt(7, 15, 0));
        assert_eq!(obs.duration_min, Some(45));
        assert!(obs.all_obs_reported);
        assert!(obs.is_countable());
    }

    #[test]
    fn test_normalize_bad_optionals_become_none() {
        let record = StringRecord::from(vec![
            "S1", "Blue Jay", "Cyanocitta cristata", "abc", "", "", "  ", "north", "2026-04-02",
            "sunrise", "1.5", "no",
        ]);

        let obs = normalize(&record, &columns(), Uuid::nil(), date()).unwrap();
        assert_eq!(obs.taxonomic_order, None);
        assert_eq!(obs.count, None);
        assert_eq!(obs.state_province, None);
        assert_eq!(obs.county, None);
        assert_eq!(obs.latitude, None);
        assert_eq!(obs.observation_time, None);
        assert_eq!(obs.duration_min, None);
        assert!(!obs.all_obs_reported);
    }

    #[test]
    fn test_normalize_skips_blank_required_field() {
        let record = StringRecord::from(vec![
            "S1", "  ", "Cyanocitta cristata", "", "", "US-NY", "", "", "2026-04-02", "", "", "",
        ]);

        let err = normalize(&record, &columns(), Uuid::nil(), date()).unwrap_err();
        assert_eq!(err, SkipReason::MissingField(COMMON_NAME));
    }

    #[test]
    fn test_short_record_treated_as_blank_fields() {
        let record = StringRecord::from(vec!["S1", "Blue Jay", "Cyanocitta cristata"]);
        let obs = normalize(&record, &columns(), Uuid::nil(), date()).unwrap();
        assert_eq!(obs.state_province, None);
    }

    #[test]
    fn test_missing_required_columns_sorted() {
        let headers = StringRecord::from(vec!["Common Name", "Date"]);
        let columns = ColumnIndex::from_headers(&headers);
        assert_eq!(
            columns.missing_required(),
            vec!["Scientific Name", "State/Province", "Submission ID"]
        );
    }

    #[test]
    fn test_header_bom_is_ignored() {
        let headers = StringRecord::from(vec![
            "\u{feff}Submission ID",
            "Common Name",
            "Scientific Name",
            "Date",
            "State/Province",
        ]);
        assert!(ColumnIndex::from_headers(&headers).missing_required().is_empty());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Some(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap());
        assert_eq!(parse_date("2026-03-07").unwrap(), expected);
        assert_eq!(parse_date("03/07/2026").unwrap(), expected);
        assert_eq!(parse_date("2026/03/07").unwrap(), expected);
        assert_eq!(parse_date("  ").unwrap(), None);
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2026-02-30").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("02:33 PM"), NaiveTime::from_hms_opt(14, 33, 0));
        assert_eq!(parse_time("12:05 AM"), NaiveTime::from_hms_opt(0, 5, 0));
        assert_eq!(parse_time("14:33"), None);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("Yes"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("maybe"));
    }

    #[test]
    fn test_parse_integer_accepts_integral_floats() {
        assert_eq!(parse_integer("12"), Some(12));
        assert_eq!(parse_integer("12.0"), Some(12));
        assert_eq!(parse_integer("12.5"), None);
        assert_eq!(parse_integer("NaN"), None);
    }
}
