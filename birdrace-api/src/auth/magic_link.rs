//! Magic-link login
//!
//! A login request stores a random single-use token on the user row and
//! emails a link carrying it. Verification consumes the token atomically.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use birdrace_common::db::User;
use birdrace_common::Result;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::SqlitePool;

use crate::db::users;

const TOKEN_BYTES: usize = 32;

/// Random URL-safe token (32 bytes of entropy)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Link the frontend handles: `<frontend>/auth/verify?token=<token>`
pub fn magic_link_url(frontend_url: &str, token: &str) -> String {
    format!("{}/auth/verify?token={}", frontend_url.trim_end_matches('/'), token)
}

/// Trim and lowercase an email address, rejecting obviously invalid input
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;

    let valid = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);

    valid.then_some(email)
}

/// Create (if needed) the user for `email` and store a fresh login token
///
/// Any earlier unused token for the user stops working.
pub async fn issue(
    pool: &SqlitePool,
    email: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(User, String)> {
    let user = users::get_or_create_user(pool, email).await?;
    let token = generate_token();

    users::set_magic_link(pool, user.id, &token, now + ttl).await?;

    Ok((user, token))
}

/// Consume a login token; `None` if unknown, used or expired
pub async fn verify(pool: &SqlitePool, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
    if token.is_empty() {
        return Ok(None);
    }
    users::consume_magic_link(pool, token, now).await
}
