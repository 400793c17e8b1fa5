//! Widget session tokens
//!
//! Widget endpoints never trust client-supplied tenant or visitor ids.
//! The widget exchanges its brand `widget_key` for a sealed token carrying
//! `{ tenant_id, brand_id, visitor_id, issued_at }`; every subsequent call
//! presents the token via the `X-Widget-Token` header (or a `token` query
//! parameter for WebSocket upgrades).

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::problem::{ErrorBuilder, Problem};

/// Maximum token age before a widget must mint a new session
const MAX_TOKEN_AGE_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum WidgetTokenError {
    #[error("Encryption error: {0}")]
    Encryption(String),
    #[error("Invalid or tampered token")]
    Invalid,
    #[error("Token expired")]
    Expired,
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// Claims sealed inside a widget session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WidgetClaims {
    pub tenant_id: i32,
    pub brand_id: Option<i32>,
    pub visitor_id: String,
    pub issued_at: i64,
}

impl WidgetClaims {
    pub fn new(tenant_id: i32, brand_id: Option<i32>, visitor_id: String) -> Self {
        Self {
            tenant_id,
            brand_id,
            visitor_id,
            issued_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Issues and verifies sealed widget session tokens
pub struct WidgetTokenService {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for WidgetTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetTokenService")
            .field("cipher", &"<hidden>")
            .finish()
    }
}

impl WidgetTokenService {
    /// Accepts either a raw 32-byte key or a hex-encoded 64-character key
    pub fn new(secret_key: &str) -> Result<Self, WidgetTokenError> {
        let key_bytes = if secret_key.len() == 32 {
            secret_key.as_bytes().to_vec()
        } else if secret_key.len() == 64 {
            hex::decode(secret_key)
                .map_err(|e| WidgetTokenError::InvalidKey(format!("Invalid hex key: {}", e)))?
        } else {
            return Err(WidgetTokenError::InvalidKey(
                "Key must be exactly 32 bytes or 64 hex characters".to_string(),
            ));
        };

        if key_bytes.len() != 32 {
            return Err(WidgetTokenError::InvalidKey(
                "Key must be exactly 32 bytes".to_string(),
            ));
        }

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Seal claims into an opaque URL-safe token
    pub fn issue(&self, claims: &WidgetClaims) -> Result<String, WidgetTokenError> {
        let plaintext =
            serde_json::to_vec(claims).map_err(|e| WidgetTokenError::Encryption(e.to_string()))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|e| WidgetTokenError::Encryption(e.to_string()))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::URL_SAFE_NO_PAD.encode(&combined))
    }

    /// Open a token, rejecting tampered or expired ones
    pub fn verify(&self, token: &str) -> Result<WidgetClaims, WidgetTokenError> {
        let combined = general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| WidgetTokenError::Invalid)?;

        if combined.len() < 12 {
            return Err(WidgetTokenError::Invalid);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| WidgetTokenError::Invalid)?;

        let claims: WidgetClaims =
            serde_json::from_slice(&plaintext).map_err(|_| WidgetTokenError::Invalid)?;

        let age = chrono::Utc::now().timestamp() - claims.issued_at;
        if age > MAX_TOKEN_AGE_SECS {
            return Err(WidgetTokenError::Expired);
        }

        Ok(claims)
    }
}

/// Extractor for verified widget sessions
///
/// Requires `Extension(Arc<WidgetTokenService>)` to be layered on the app.
#[derive(Debug, Clone)]
pub struct WidgetSession(pub WidgetClaims);

impl<S> FromRequestParts<S> for WidgetSession
where
    S: Send + Sync,
{
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Arc<WidgetTokenService>>()
            .cloned()
            .ok_or_else(|| {
                ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .title("Widget token service not configured")
                    .build()
            })?;

        let token = header_token(parts)
            .or_else(|| query_token(parts))
            .ok_or_else(|| {
                ErrorBuilder::new(StatusCode::UNAUTHORIZED)
                    .title("Missing widget session token")
                    .detail("Provide X-Widget-Token or a token query parameter")
                    .build()
            })?;

        let claims = service.verify(&token).map_err(|e| {
            ErrorBuilder::new(StatusCode::UNAUTHORIZED)
                .title("Invalid widget session token")
                .detail(e.to_string())
                .build()
        })?;

        Ok(WidgetSession(claims))
    }
}

fn header_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("x-widget-token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn query_token(parts: &Parts) -> Option<String> {
    // Tokens are base64url, so no percent-decoding is needed here
    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("token=")
                .map(|value| value.to_string())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let service = WidgetTokenService::new(TEST_KEY).unwrap();
        let claims = WidgetClaims::new(42, Some(7), "v-abc".to_string());

        let token = service.issue(&claims).unwrap();
        let opened = service.verify(&token).unwrap();

        assert_eq!(opened, claims);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let service = WidgetTokenService::new(TEST_KEY).unwrap();
        let claims = WidgetClaims::new(1, None, "v-1".to_string());

        let mut token = service.issue(&claims).unwrap();
        token.replace_range(4..6, "AA");

        assert!(matches!(
            service.verify(&token),
            Err(WidgetTokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = WidgetTokenService::new(TEST_KEY).unwrap();
        let claims = WidgetClaims {
            tenant_id: 1,
            brand_id: None,
            visitor_id: "v-1".to_string(),
            issued_at: chrono::Utc::now().timestamp() - MAX_TOKEN_AGE_SECS - 10,
        };

        let token = service.issue(&claims).unwrap();
        assert!(matches!(
            service.verify(&token),
            Err(WidgetTokenError::Expired)
        ));
    }

    #[test]
    fn test_rejects_short_keys() {
        assert!(WidgetTokenService::new("too-short").is_err());
    }

    #[test]
    fn test_wrong_key_cannot_open() {
        let issuer = WidgetTokenService::new(TEST_KEY).unwrap();
        let other = WidgetTokenService::new("ffffffffffffffffffffffffffffffff").unwrap();

        let token = issuer
            .issue(&WidgetClaims::new(1, None, "v-1".to_string()))
            .unwrap();
        assert!(other.verify(&token).is_err());
    }
}
