//! User database operations

use birdrace_common::db::{PrivacyLevel, User};
use birdrace_common::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_guid;

const USER_COLUMNS: &str = "guid, email, name, privacy_level, created_at, last_login";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let guid: String = row.try_get("guid")?;
    let privacy: String = row.try_get("privacy_level")?;

    Ok(User {
        id: parse_guid(&guid)?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        privacy_level: privacy.parse()?,
        created_at: row.try_get("created_at")?,
        last_login: row.try_get("last_login")?,
    })
}

/// Display name for a new account: the email's local part, title-cased
///
/// `"jane.doe@example.com"` becomes `"Jane.Doe"`.
pub fn default_display_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let mut name = String::with_capacity(local.len());
    let mut at_word_start = true;

    for c in local.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                name.extend(c.to_uppercase());
            } else {
                name.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            name.push(c);
            at_word_start = true;
        }
    }

    name
}

/// Load user by id
pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE guid = ?", USER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Load user by (normalized) email
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Fetch the user with this email, creating the account on first contact
pub async fn get_or_create_user(pool: &SqlitePool, email: &str) -> Result<User> {
    // INSERT OR IGNORE: two concurrent first requests for the same email
    // both end up reading the single row that won.
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO users (guid, email, name, privacy_level, created_at)
        VALUES (?, ?, ?, 'public', ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(email)
    .bind(default_display_name(email))
    .bind(Utc::now())
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!("Created user account for {}", email);
    }

    get_user_by_email(pool, email).await?.ok_or_else(|| {
        birdrace_common::Error::Internal(format!("User {} missing after insert", email))
    })
}

/// Store a login token, replacing any previous one
pub async fn set_magic_link(
    pool: &SqlitePool,
    user_id: Uuid,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE users SET magic_link_token = ?, magic_link_expires = ? WHERE guid = ?")
        .bind(token)
        .bind(expires_at.timestamp())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Consume a login token
///
/// Clears the token and records the login in one conditional UPDATE, so a
/// token can succeed at most once even under concurrent verification.
/// Returns `None` for unknown, already used, or expired tokens.
pub async fn consume_magic_link(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE users
        SET magic_link_token = NULL, magic_link_expires = NULL, last_login = ?
        WHERE magic_link_token = ? AND magic_link_expires > ?
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(now)
    .bind(token)
    .bind(now.timestamp())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Update display name and/or privacy level; returns the updated user
pub async fn update_profile(
    pool: &SqlitePool,
    user_id: Uuid,
    name: Option<&str>,
    privacy_level: Option<PrivacyLevel>,
) -> Result<Option<User>> {
    sqlx::query(
        r#"
        UPDATE users
        SET name = COALESCE(?, name),
            privacy_level = COALESCE(?, privacy_level)
        WHERE guid = ?
        "#,
    )
    .bind(name)
    .bind(privacy_level.map(|p| p.as_str()))
    .bind(user_id.to_string())
    .execute(pool)
    .await?;

    get_user(pool, user_id).await
}
