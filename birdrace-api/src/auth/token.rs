//! Bearer access tokens
//!
//! Compact HS256 JWTs (`header.payload.signature`, base64url without
//! padding). Tokens are stateless; logging out is a client-side action.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use birdrace_common::Result;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Fixed JOSE header: `{"alg":"HS256","typ":"JWT"}`
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

const MAX_TOKEN_LEN: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub email: String,
    /// Issued at, unix seconds
    pub iat: i64,
    /// Expiry, unix seconds
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Issues and verifies access tokens with one shared secret
pub struct TokenSigner {
    /// Keyed MAC, cloned per use
    mac: HmacSha256,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| birdrace_common::Error::Config(format!("Invalid token secret: {}", e)))?;

        Ok(Self { mac, ttl })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> String {
        self.issue_at(user_id, email, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, email: &str, now: DateTime<Utc>) -> String {
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        // Claims hold only strings and integers
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature)
    }

    pub fn verify(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Claims, TokenError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed);
        }

        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (header, payload) = signing_input.split_once('.').ok_or(TokenError::Malformed)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let header = URL_SAFE_NO_PAD.decode(header).map_err(|_| TokenError::Malformed)?;
        if header != HEADER.as_bytes() {
            return Err(TokenError::Malformed);
        }

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("0123456789abcdef0123456789abcdef", Duration::days(30)).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let user = Uuid::new_v4();
        let token = signer().issue(user, "a@example.com");

        assert_eq!(token.split('.').count(), 3);
        let claims = signer().verify(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = Utc::now();
        let token = signer().issue_at(Uuid::new_v4(), "a@example.com", now);

        let later = now + Duration::days(30) + Duration::seconds(1);
        assert_eq!(signer().verify_at(&token, later), Err(TokenError::Expired));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = signer().issue(Uuid::new_v4(), "a@example.com");
        let other = TokenSigner::new("another-secret-of-sufficient-len", Duration::days(30)).unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = signer().issue(Uuid::new_v4(), "a@example.com");
        let parts: Vec<&str> = token.split('.').collect();

        let forged_claims = Claims {
            sub: Uuid::new_v4(),
            email: "evil@example.com".to_string(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(signer().verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(signer().verify(""), Err(TokenError::Malformed));
        assert_eq!(signer().verify("abc"), Err(TokenError::Malformed));
        assert_eq!(signer().verify("a.b.!!!"), Err(TokenError::Malformed));
    }
}
