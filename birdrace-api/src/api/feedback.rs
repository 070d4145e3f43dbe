//! Feature request endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::{error, info};

use super::MessageResponse;
use crate::auth::magic_link::normalize_email;
use crate::email::templates::feature_request_email;
use crate::{ApiError, ApiResult, AppState};

const MIN_SUGGESTION_LEN: usize = 10;
const MAX_SUGGESTION_LEN: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct FeatureRequest {
    pub suggestion: String,
    /// Optional reply-to address
    pub email: Option<String>,
}

/// POST /feedback/feature-request
///
/// Emails the suggestion to the site owner. No login required.
pub async fn submit_feature_request(
    State(state): State<AppState>,
    Json(request): Json<FeatureRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let suggestion = request.suggestion.trim();
    let len = suggestion.chars().count();
    if !(MIN_SUGGESTION_LEN..=MAX_SUGGESTION_LEN).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "Suggestion must be between {} and {} characters",
            MIN_SUGGESTION_LEN, MAX_SUGGESTION_LEN
        )));
    }

    let reply_to = match request.email.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(email) => Some(
            normalize_email(email)
                .ok_or_else(|| ApiError::BadRequest("Invalid email address".to_string()))?,
        ),
    };

    let settings = &state.config.email;
    let owner = settings
        .owner_address
        .as_deref()
        .unwrap_or(&settings.from_address);

    let message = feature_request_email(owner, suggestion, reply_to.as_deref());
    if let Err(e) = state.mailer.send(&message).await {
        error!("Failed to send feature request via {}: {}", state.mailer.name(), e);
        return Err(ApiError::EmailDelivery(
            "Failed to send feature request. Please try again later.".to_string(),
        ));
    }

    info!("Feature request forwarded to site owner");

    Ok(Json(MessageResponse::new(
        "Thank you! Your feature request has been submitted.",
    )))
}

/// Build feedback routes
pub fn feedback_routes() -> Router<AppState> {
    Router::new().route("/feedback/feature-request", post(submit_feature_request))
}
