//! eBird CSV import pipeline
//!
//! Import runs in two phases. The whole file is parsed and validated first
//! (structure, required columns, every date), so a bad file commits nothing.
//! Rows are then inserted one statement at a time; a failing row is counted
//! and never aborts the batch. Aggregates are recomputed at the end.

pub mod normalize;

use chrono::{Datelike, NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregates;
use crate::db::observations::{insert_observation, InsertOutcome};
use normalize::{normalize, parse_date, ColumnIndex, DATE};

/// Outcome counters for one import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Rows dated within the target year
    pub rows_seen: u64,
    pub rows_imported: u64,
    pub rows_duplicate: u64,
    pub rows_errored: u64,
    /// Distinct scientific names among imported rows, countable or not
    pub distinct_species_imported: u64,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

/// File-level import failures. Nothing has been written when these occur.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read CSV file: {0}")]
    Format(String),

    #[error("Missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },
}

/// A validated in-year row waiting for insertion
struct PendingRow {
    line: u64,
    record: StringRecord,
    date: NaiveDate,
}

/// Parse and validate the whole file, keeping only rows dated in `target_year`
fn read_rows(bytes: &[u8], target_year: i32) -> Result<(ColumnIndex, Vec<PendingRow>), ImportError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ImportError::Format("file is empty".to_string()));
    }

    let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Format(e.to_string()))?
        .clone();
    let columns = ColumnIndex::from_headers(&headers);

    let missing = columns.missing_required();
    if !missing.is_empty() {
        return Err(ImportError::Schema { missing });
    }

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| ImportError::Format(e.to_string()))?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 2);

        let raw_date = columns.get(&record, DATE).unwrap_or("");
        let date = parse_date(raw_date)
            .map_err(|e| ImportError::Format(format!("line {}: {}", line, e)))?;

        match date {
            Some(date) if date.year() == target_year => rows.push(PendingRow { line, record, date }),
            _ => {}
        }
    }

    Ok((columns, rows))
}

/// Import an eBird export for `user_id`
///
/// Only rows dated within `target_year` are considered. Re-importing the
/// same file reports every row as a duplicate. Aggregate recomputation
/// failures are logged; the returned stats still describe what was stored.
pub async fn import_file(
    pool: &SqlitePool,
    bytes: &[u8],
    user_id: Uuid,
    target_year: i32,
) -> Result<ImportStats, ImportError> {
    let (columns, rows) = read_rows(bytes, target_year)?;

    let mut stats = ImportStats {
        rows_seen: rows.len() as u64,
        ..Default::default()
    };

    if rows.is_empty() {
        info!("No {} observations in upload for user {}", target_year, user_id);
        return Ok(stats);
    }

    let uploaded_at = Utc::now();
    let mut species: HashSet<String> = HashSet::new();

    for row in &rows {
        let obs = match normalize(&row.record, &columns, user_id, row.date) {
            Ok(obs) => obs,
            Err(reason) => {
                warn!("Skipping line {}: {}", row.line, reason);
                stats.rows_errored += 1;
                continue;
            }
        };

        match insert_observation(pool, &obs, uploaded_at).await {
            Ok(InsertOutcome::Inserted) => {
                stats.rows_imported += 1;
                stats.earliest_date = Some(stats.earliest_date.map_or(row.date, |d| d.min(row.date)));
                stats.latest_date = Some(stats.latest_date.map_or(row.date, |d| d.max(row.date)));
                species.insert(obs.scientific_name);
            }
            Ok(InsertOutcome::Duplicate) => {
                debug!("Duplicate observation on line {}", row.line);
                stats.rows_duplicate += 1;
            }
            Err(e) => {
                error!("Failed to insert line {}: {}", row.line, e);
                stats.rows_errored += 1;
            }
        }
    }

    stats.distinct_species_imported = species.len() as u64;

    info!(
        "Imported {} of {} rows for user {} ({} duplicates, {} errors)",
        stats.rows_imported, stats.rows_seen, user_id, stats.rows_duplicate, stats.rows_errored
    );

    if let Err(e) = aggregates::recompute(pool, user_id, target_year).await {
        error!("Failed to recompute stats for user {}: {}", user_id, e);
    }

    Ok(stats)
}
