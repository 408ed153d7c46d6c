// ABOUTME: Wire models for token endpoint responses and OAuth 2.0 error bodies
// ABOUTME: Raw responses are converted into TokenSet so token strings only travel as Secret
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::Secret;

/// Token endpoint success body (RFC 6749 section 5.1, RFC 8693 section 2.2.1)
#[derive(Deserialize)]
pub(crate) struct RawTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub issued_token_type: Option<String>,
}

/// OAuth 2.0 error body (RFC 6749 section 5.2)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuth2ErrorResponse {
    /// Error code such as `invalid_grant`
    pub error: String,
    /// Human-readable detail
    #[serde(default)]
    pub error_description: Option<String>,
}

impl OAuth2ErrorResponse {
    /// `error: description` or just `error`
    #[must_use]
    pub fn summary(&self) -> String {
        self.error_description.as_deref().map_or_else(
            || self.error.clone(),
            |description| format!("{}: {description}", self.error),
        )
    }
}

/// Tokens returned by one grant
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Access token (JWT)
    pub access_token: Secret,
    /// New refresh token, when the server issued or rotated one
    pub refresh_token: Option<Secret>,
    /// Token type, normally `Bearer`
    pub token_type: String,
    /// Expiry computed from `expires_in` at receipt
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scope
    pub scope: Option<String>,
    /// RFC 8693 issued token type
    pub issued_token_type: Option<String>,
}

impl From<RawTokenResponse> for TokenSet {
    fn from(raw: RawTokenResponse) -> Self {
        Self {
            access_token: Secret::new(raw.access_token),
            refresh_token: raw.refresh_token.filter(|t| !t.is_empty()).map(Secret::new),
            token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_owned()),
            expires_at: raw.expires_in.and_then(expiry_from_lifetime),
            scope: raw.scope,
            issued_token_type: raw.issued_token_type,
        }
    }
}

/// Absolute expiry for a lifetime in seconds. Non-positive or unrepresentable
/// lifetimes yield `None` so callers fall back to their own bound.
fn expiry_from_lifetime(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Duration::try_seconds(secs).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}
