//! Outgoing email
//!
//! Login links and feature requests go through an [`EmailProvider`].
//! Resend is used when an API key is configured; otherwise messages are
//! written to the log so local development works without credentials.

mod log;
mod resend;
pub mod templates;

pub use self::log::LogProvider;
pub use self::resend::ResendProvider;

use async_trait::async_trait;
use birdrace_common::config::EmailSettings;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Email sending error
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A rendered message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub reply_to: Option<String>,
}

/// Trait for email providers
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Deliver one message. Implementations do not retry.
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;
}

/// Create the email provider for these settings
pub fn create_provider(settings: &EmailSettings) -> Result<Arc<dyn EmailProvider>, EmailError> {
    match settings.resend_api_key.as_deref() {
        Some(api_key) => Ok(Arc::new(ResendProvider::new(
            api_key,
            &settings.from_address,
        )?)),
        None => {
            warn!("No Resend API key configured; emails will be logged instead of sent");
            Ok(Arc::new(LogProvider))
        }
    }
}
