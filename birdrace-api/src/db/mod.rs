//! Database access for birdrace-api
//!
//! Thin query functions over the shared SQLite schema created by
//! `birdrace_common::db::init`.

pub mod observations;
pub mod stats;
pub mod summary;
pub mod users;

use birdrace_common::{Error, Result};
use chrono::NaiveDate;
use uuid::Uuid;

/// Parse a stored guid column
pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid guid '{}': {}", value, e)))
}

/// Half-open date range `[Jan 1 of year, Jan 1 of year + 1)`
pub fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = year
        .checked_add(1)
        .and_then(|next| NaiveDate::from_ymd_opt(next, 1, 1));

    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(Error::InvalidInput(format!("Invalid year: {}", year))),
    }
}
