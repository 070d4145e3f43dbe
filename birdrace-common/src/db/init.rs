//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every table
//! idempotently. Safe to call on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas: every pooled connection gets foreign keys,
    // WAL (readers keep their snapshot while a summary refresh commits)
    // and the busy timeout.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_observations_table(pool).await?;
    create_monthly_stats_table(pool).await?;
    create_geographic_stats_table(pool).await?;
    create_species_summary_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the users table
///
/// The login token and its expiry are cleared once the token is used.
pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            privacy_level TEXT NOT NULL DEFAULT 'public'
                CHECK (privacy_level IN ('public', 'counts_only', 'private')),
            created_at TIMESTAMP NOT NULL,
            last_login TIMESTAMP,
            magic_link_token TEXT,
            magic_link_expires INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_magic_link ON users(magic_link_token)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the observations table
///
/// The natural key (user, submission, common name, date) is UNIQUE so a
/// re-imported checklist is rejected row by row instead of duplicated.
pub async fn create_observations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            submission_id TEXT NOT NULL,
            common_name TEXT NOT NULL,
            scientific_name TEXT NOT NULL,
            taxonomic_order INTEGER,
            count TEXT,
            state_province TEXT,
            county TEXT,
            location_id TEXT,
            location TEXT,
            latitude REAL,
            longitude REAL,
            observation_date DATE NOT NULL,
            observation_time TIME,
            protocol TEXT,
            duration_min INTEGER,
            all_obs_reported INTEGER NOT NULL DEFAULT 0,
            distance_traveled_km REAL,
            area_covered_ha REAL,
            num_observers INTEGER,
            breeding_code TEXT,
            observation_details TEXT,
            checklist_comments TEXT,
            ml_catalog_numbers TEXT,
            countable INTEGER NOT NULL,
            uploaded_at TIMESTAMP NOT NULL,
            UNIQUE (user_id, submission_id, common_name, observation_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observations_user_date ON observations(user_id, observation_date)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observations_scientific_name ON observations(scientific_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_monthly_stats_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS monthly_stats (
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
            species_count INTEGER NOT NULL,
            new_species_count INTEGER NOT NULL,
            total_observations INTEGER NOT NULL,
            calculated_at TIMESTAMP NOT NULL,
            PRIMARY KEY (user_id, year, month)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_geographic_stats_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS geographic_stats (
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            state_province TEXT NOT NULL,
            county TEXT NOT NULL DEFAULT '',
            species_count INTEGER NOT NULL,
            first_observation DATE NOT NULL,
            last_observation DATE NOT NULL,
            PRIMARY KEY (user_id, state_province, county)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the species_summary table (leaderboard snapshot)
///
/// Rebuilt wholesale inside one transaction; see `refresh_species_summary`
/// in the service crate.
async fn create_species_summary_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS species_summary (
            year INTEGER NOT NULL,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            user_name TEXT NOT NULL,
            user_email TEXT NOT NULL,
            privacy_level TEXT NOT NULL,
            species_count INTEGER NOT NULL,
            last_observation_date DATE,
            last_upload_date TIMESTAMP,
            refreshed_at TIMESTAMP NOT NULL,
            PRIMARY KEY (year, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
