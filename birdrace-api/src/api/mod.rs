//! HTTP API handlers for birdrace-api

pub mod auth;
pub mod feedback;
pub mod health;
pub mod leaderboard;
pub mod upload;
pub mod user;

pub use auth::auth_routes;
pub use feedback::feedback_routes;
pub use health::health_routes;
pub use leaderboard::leaderboard_routes;
pub use upload::upload_routes;
pub use user::user_routes;

use serde::Serialize;

/// `{"message": ...}` response body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
