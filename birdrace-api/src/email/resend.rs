//! Resend email provider (https://resend.com)

use super::{EmailError, EmailMessage, EmailProvider};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const USER_AGENT: &str = concat!("birdrace/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

/// Resend email provider
pub struct ResendProvider {
    http_client: reqwest::Client,
    api_key: String,
    from_address: String,
}

impl ResendProvider {
    pub fn new(api_key: &str, from_address: &str) -> Result<Self, EmailError> {
        if api_key.trim().is_empty() {
            return Err(EmailError::InvalidConfig("Resend API key is empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| EmailError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: api_key.to_string(),
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let body = SendEmailRequest {
            from: &self.from_address,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            reply_to: message.reply_to.as_deref(),
        };

        let response = self
            .http_client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmailError::SendFailed(format!(
                "Resend returned {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        tracing::info!(to = %message.to, subject = %message.subject, "Email sent via Resend");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            ResendProvider::new("  ", "from@example.com"),
            Err(EmailError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = SendEmailRequest {
            from: "from@example.com",
            to: ["to@example.com"],
            subject: "Hello",
            html: "<p>Hi</p>",
            reply_to: None,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"][0], "to@example.com");
        assert!(json.get("reply_to").is_none());
    }
}
