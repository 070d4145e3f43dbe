//! birdrace-api library interface
//!
//! HTTP service for the BirdRace big-year competition: eBird CSV import,
//! per-user statistics, the public leaderboard and magic-link login.
//! Exposed as a library so integration tests can drive the router directly.

pub mod aggregates;
pub mod api;
pub mod auth;
pub mod db;
pub mod email;
pub mod error;
pub mod import;
pub mod leaderboard;

pub use crate::error::{ApiError, ApiResult};

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use birdrace_common::config::Config;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::TokenSigner;
use crate::email::EmailProvider;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved configuration
    pub config: Arc<Config>,
    /// Access token issuer/verifier
    pub tokens: Arc<TokenSigner>,
    /// Outgoing email
    pub mailer: Arc<dyn EmailProvider>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: Config,
        mailer: Arc<dyn EmailProvider>,
    ) -> birdrace_common::Result<Self> {
        let tokens = TokenSigner::new(
            &config.token_secret,
            Duration::days(config.access_token_ttl_days),
        )?;

        Ok(Self {
            db,
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            mailer,
            startup_time: Utc::now(),
        })
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .into_iter()
        // Wildcards cannot be combined with credentialed requests
        .filter(|origin| origin != "*")
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::upload_routes(state.config.max_upload_bytes))
        .merge(api::leaderboard_routes())
        .merge(api::user_routes())
        .merge(api::feedback_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
