//! Magic-link login endpoints

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use birdrace_common::db::User;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::MessageResponse;
use crate::auth::magic_link;
use crate::email::templates::magic_link_email;
use crate::error::LOGIN_EMAIL_FAILURE;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    pub message: String,
    /// Seconds until the link expires
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

/// POST /auth/request-magic-link
///
/// Creates the account on first contact, stores a fresh single-use token
/// and emails the login link.
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(request): Json<MagicLinkRequest>,
) -> ApiResult<Json<MagicLinkResponse>> {
    let email = magic_link::normalize_email(&request.email)
        .ok_or_else(|| ApiError::BadRequest("Invalid email address".to_string()))?;

    let ttl_minutes = state.config.magic_link_ttl_minutes;
    let (user, token) =
        magic_link::issue(&state.db, &email, Duration::minutes(ttl_minutes), Utc::now()).await?;

    let link = magic_link::magic_link_url(&state.config.frontend_url, &token);
    let message = magic_link_email(&user.email, &link, ttl_minutes);

    if let Err(e) = state.mailer.send(&message).await {
        error!("Failed to send login link to {} via {}: {}", user.email, state.mailer.name(), e);
        return Err(ApiError::EmailDelivery(LOGIN_EMAIL_FAILURE.to_string()));
    }

    info!("Login link issued for {}", user.email);

    Ok(Json(MagicLinkResponse {
        message: "Magic link sent to email".to_string(),
        expires_in: ttl_minutes * 60,
    }))
}

/// GET /auth/verify?token=
///
/// Exchanges a login token for a bearer access token. Each token works once.
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Json<TokenResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid or expired magic link token".to_string());

    let token = query.token.unwrap_or_default();
    let user = magic_link::verify(&state.db, token.trim(), Utc::now())
        .await?
        .ok_or_else(invalid)?;

    info!("User {} logged in", user.id);

    Ok(Json(TokenResponse {
        access_token: state.tokens.issue(user.id, &user.email),
        token_type: "bearer".to_string(),
        user,
    }))
}

/// POST /auth/logout
///
/// Access tokens are stateless; the client discards its copy.
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::new("Logged out successfully"))
}

/// Build authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/request-magic-link", post(request_magic_link))
        .route("/auth/verify", get(verify))
        .route("/auth/logout", post(logout))
}
