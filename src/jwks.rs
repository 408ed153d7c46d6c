// ABOUTME: Local validation of access tokens against the issuer's JWKS
// ABOUTME: Checks RS256 signature, issuer, expiry and an exact audience match before anything trusts a token
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! Access token validation
//!
//! A [`ValidatedToken`] can only come out of [`TokenValidator::validate`]. Both
//! the launcher (before spawning) and the worker (before touching the record
//! store) run the same checks.

use chrono::{DateTime, TimeZone, Utc};
use engify_core::models::UserId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::defaults::TOKEN_LEEWAY_SECS;
use crate::credentials::Secret;
use crate::errors::{AppError, AppResult};
use crate::oauth2_client::OAuth2Client;

/// `aud` may be a single string or an array (RFC 7519 section 4.1.3)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience
    One(String),
    /// Audience list
    Many(Vec<String>),
}

impl Audience {
    /// True only when the audience is exactly `[expected]`
    #[must_use]
    pub fn is_exactly(&self, expected: &str) -> bool {
        match self {
            Self::One(aud) => aud == expected,
            Self::Many(list) => list.len() == 1 && list[0] == expected,
        }
    }
}

/// Claims carried by Engify access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject: the Engify user id
    pub sub: String,
    /// Audience: the resource indicator the token was issued for
    pub aud: Audience,
    /// Issuer
    pub iss: String,
    /// Expiry (seconds since epoch)
    pub exp: i64,
    /// Issued at
    #[serde(default)]
    pub iat: Option<i64>,
    /// Space-separated scopes
    #[serde(default)]
    pub scope: Option<String>,
    /// Token id
    #[serde(default)]
    pub jti: Option<String>,
}

/// An access token that passed every local check
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    user_id: UserId,
    audience: String,
    expires_at: DateTime<Utc>,
    scope: Option<String>,
    token: Secret,
}

impl ValidatedToken {
    /// User id from `sub`
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The audience the token was validated against
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Expiry
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Granted scope
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// The raw token, for handoff or as an RFC 8693 subject token
    #[must_use]
    pub const fn token(&self) -> &Secret {
        &self.token
    }
}

/// Validates access tokens for one issuer and one audience
pub struct TokenValidator {
    keys: JwkSet,
    issuer: String,
    audience: String,
}

impl TokenValidator {
    /// Validator over a known key set
    #[must_use]
    pub fn new(keys: JwkSet, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Fetch the issuer's key set and build a validator for the client's resource
    ///
    /// # Errors
    /// Returns an authentication error if the JWKS cannot be fetched
    pub async fn fetch(client: &OAuth2Client) -> AppResult<Self> {
        let keys = client.fetch_jwks().await?;
        debug!(keys = keys.keys.len(), "Fetched JWKS");
        Ok(Self::new(
            keys,
            client.config().issuer.clone(),
            client.config().resource.clone(),
        ))
    }

    /// Required audience
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Run every check on `token`
    ///
    /// # Errors
    /// `AuthExpired` for an expired token, `AuthInvalid` for any other failure
    pub fn validate(&self, token: &Secret) -> AppResult<ValidatedToken> {
        let header = decode_header(token.expose())
            .map_err(|e| AppError::auth_invalid(format!("Malformed access token: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::auth_invalid(format!(
                "Unsupported token algorithm {:?}",
                header.alg
            )));
        }

        let jwk = self.select_key(header.kid.as_deref())?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AppError::auth_invalid(format!("Unusable signing key: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = TOKEN_LEEWAY_SECS;
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);

        let claims = decode::<AccessTokenClaims>(token.expose(), &key, &validation)
            .map_err(|e| {
                warn!(error = %e, "Access token failed validation");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::auth_expired("Access token has expired"),
                    ErrorKind::InvalidAudience => AppError::auth_invalid(format!(
                        "Access token audience does not match {}",
                        self.audience
                    )),
                    ErrorKind::InvalidIssuer => AppError::auth_invalid("Access token issuer mismatch"),
                    ErrorKind::InvalidSignature => {
                        AppError::auth_invalid("Access token signature is invalid")
                    }
                    _ => AppError::auth_invalid(format!("Access token rejected: {e}")),
                }
            })?
            .claims;

        // The library accepts any overlap; the relay requires exactly the requested resource
        if !claims.aud.is_exactly(&self.audience) {
            return Err(AppError::auth_invalid(format!(
                "Access token audience must be exactly {}",
                self.audience
            )));
        }

        if claims.sub.trim().is_empty() {
            return Err(AppError::auth_invalid("Access token has an empty subject"));
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| AppError::auth_invalid("Access token expiry is out of range"))?;

        Ok(ValidatedToken {
            user_id: UserId::new(claims.sub),
            audience: self.audience.clone(),
            expires_at,
            scope: claims.scope,
            token: token.clone(),
        })
    }

    fn select_key(&self, kid: Option<&str>) -> AppResult<&Jwk> {
        match kid {
            Some(kid) => self
                .keys
                .find(kid)
                .ok_or_else(|| AppError::auth_invalid(format!("Unknown signing key '{kid}'"))),
            None => match self.keys.keys.as_slice() {
                [only] => Ok(only),
                _ => Err(AppError::auth_invalid(
                    "Access token has no key id and the issuer publishes several keys",
                )),
            },
        }
    }
}
