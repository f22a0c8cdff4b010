use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{GarminError, Result};

/// OAuth2 bearer token for Connect API requests.
///
/// Acquired by an external login step and stored as JSON; this crate only
/// reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth2Token {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub jti: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix timestamp; zero means the issuer did not say
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuth2Token {
    /// A bare bearer token with a known expiry
    pub fn bearer(access_token: impl Into<String>, expires_at: i64) -> Self {
        Self {
            scope: String::new(),
            jti: String::new(),
            token_type: default_token_type(),
            access_token: access_token.into(),
            refresh_token: String::new(),
            expires_in: 0,
            expires_at,
            refresh_token_expires_in: 0,
            refresh_token_expires_at: 0,
        }
    }

    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at != 0 && self.expires_at < Utc::now().timestamp()
    }

    /// Fail with `NotAuthenticated` when the token can no longer be used
    pub fn ensure_valid(&self) -> Result<()> {
        if self.access_token.is_empty() || self.is_expired() {
            return Err(GarminError::NotAuthenticated);
        }
        Ok(())
    }

    /// Returns the Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}
