//! Development email provider: writes messages to the log

use super::{EmailError, EmailMessage, EmailProvider};
use async_trait::async_trait;

/// Logs every message at `info` instead of delivering it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProvider;

#[async_trait]
impl EmailProvider for LogProvider {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            reply_to = ?message.reply_to,
            "Email not sent (no provider configured):\n{}",
            message.html
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
