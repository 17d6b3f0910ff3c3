use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The handful of id-token claims worth logging.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub email: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// Decode the payload segment of a JWT without verifying it.
///
/// Returns `None` for opaque access tokens (e.g. `ya29.`) and malformed input.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload_b64 = token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&decoded).ok()
}
