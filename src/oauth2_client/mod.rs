// ABOUTME: OAuth 2.1 public-client for the Engify authorization server
// ABOUTME: Authorization URL, code/refresh grants, RFC 8693 exchange, RFC 7009 revocation, JWKS fetch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! OAuth 2.1 client
//!
//! The CLI is a public client: no client secret, PKCE on every authorization
//! request, and an RFC 8707 `resource` on every grant so issued tokens are bound
//! to the tool server's audience. No request is retried; callers decide what a
//! failure means for their invocation.

/// Token endpoint wire models
pub mod models;
/// PKCE and state generation
pub mod pkce;

use jsonwebtoken::jwk::JwkSet;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::config::environment::OAuthClientConfig;
use crate::constants::oauth::{
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN, GRANT_TOKEN_EXCHANGE, TOKEN_TYPE_ACCESS_TOKEN,
};
use crate::credentials::Secret;
use crate::errors::{AppError, AppResult};

pub use models::{OAuth2ErrorResponse, TokenSet};
pub use pkce::{generate_state, state_matches, PkceParams};

/// Which grant a token request carries; decides how failures are classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
    TokenExchange,
}

impl Grant {
    const fn label(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization code exchange",
            Self::RefreshToken => "refresh token exchange",
            Self::TokenExchange => "on-behalf-of exchange",
        }
    }

    /// Map a transport failure (connect error, timeout, bad body)
    fn transport_error(self, detail: &str) -> AppError {
        match self {
            // The launcher treats an unreachable token endpoint as an auth failure
            Self::AuthorizationCode | Self::RefreshToken => {
                AppError::auth_invalid(format!("{} failed: {detail}", self.label()))
            }
            Self::TokenExchange => AppError::external_service("token endpoint", detail.to_owned()),
        }
    }

    /// Map a non-success response from the token endpoint
    fn rejection(self, status: StatusCode, body: &OAuth2ErrorResponse) -> AppError {
        let detail = format!("{} rejected ({status}): {}", self.label(), body.summary());
        match self {
            Self::RefreshToken if body.error == "invalid_grant" => AppError::auth_expired(detail),
            Self::AuthorizationCode | Self::RefreshToken => AppError::auth_invalid(detail),
            Self::TokenExchange if status.is_server_error() => {
                AppError::external_service("token endpoint", detail)
            }
            Self::TokenExchange => AppError::forbidden(detail),
        }
    }
}

/// OAuth client bound to one issuer, client id and resource
#[derive(Clone)]
pub struct OAuth2Client {
    http: Client,
    config: OAuthClientConfig,
}

impl OAuth2Client {
    /// Build a client with the configured round-trip timeout
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(config: OAuthClientConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.http_timeout)
            .user_agent(concat!("engify-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Client configuration
    #[must_use]
    pub const fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    /// Build the authorization URL for a PKCE request
    #[must_use]
    pub fn authorization_url(&self, pkce: &PkceParams, state: &str, redirect_uri: &str) -> Url {
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", pkce.code_challenge_method)
            .append_pair("resource", &self.config.resource);
        url
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    /// Returns an authentication error if the endpoint rejects the code or cannot be reached
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> AppResult<TokenSet> {
        let form = [
            ("grant_type", GRANT_AUTHORIZATION_CODE),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
            ("resource", self.config.resource.as_str()),
        ];
        self.token_request(&form, Grant::AuthorizationCode).await
    }

    /// Exchange the refresh token for an access token bound to the configured resource
    ///
    /// # Errors
    /// Returns `AuthExpired` for `invalid_grant`, `AuthInvalid` for any other failure
    pub async fn refresh(&self, refresh_token: &Secret) -> AppResult<TokenSet> {
        let form = [
            ("grant_type", GRANT_REFRESH_TOKEN),
            ("refresh_token", refresh_token.expose()),
            ("client_id", self.config.client_id.as_str()),
            ("resource", self.config.resource.as_str()),
        ];
        self.token_request(&form, Grant::RefreshToken).await
    }

    /// RFC 8693 exchange: trade `subject_token` for a narrower token for `audience`
    ///
    /// # Errors
    /// Returns `PermissionDenied` when the exchange is refused
    pub async fn exchange_on_behalf_of(
        &self,
        subject_token: &Secret,
        audience: &str,
        scope: &str,
    ) -> AppResult<TokenSet> {
        let form = [
            ("grant_type", GRANT_TOKEN_EXCHANGE),
            ("client_id", self.config.client_id.as_str()),
            ("subject_token", subject_token.expose()),
            ("subject_token_type", TOKEN_TYPE_ACCESS_TOKEN),
            ("requested_token_type", TOKEN_TYPE_ACCESS_TOKEN),
            ("audience", audience),
            ("resource", audience),
            ("scope", scope),
        ];
        self.token_request(&form, Grant::TokenExchange).await
    }

    /// RFC 7009 revocation of a refresh token
    ///
    /// # Errors
    /// Returns an error if no revocation endpoint is configured or the request fails
    pub async fn revoke(&self, refresh_token: &Secret) -> AppResult<()> {
        let url = self
            .config
            .revocation_url
            .clone()
            .ok_or_else(|| AppError::config("No revocation endpoint configured"))?;

        let response = self
            .http
            .post(url)
            .form(&[
                ("token", refresh_token.expose()),
                ("token_type_hint", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::external_service("revocation endpoint", e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::external_service(
                "revocation endpoint",
                format!("returned {}", response.status()),
            ))
        }
    }

    /// Fetch the issuer's public keys
    ///
    /// # Errors
    /// Returns an authentication error if the key set cannot be fetched or parsed
    pub async fn fetch_jwks(&self) -> AppResult<JwkSet> {
        let response = self
            .http
            .get(self.config.jwks_url.clone())
            .send()
            .await
            .map_err(|e| AppError::auth_invalid(format!("JWKS fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::auth_invalid(format!(
                "JWKS fetch failed: {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AppError::auth_invalid(format!("JWKS response is malformed: {e}")))
    }

    async fn token_request(&self, form: &[(&str, &str)], grant: Grant) -> AppResult<TokenSet> {
        debug!(grant = grant.label(), endpoint = %self.config.token_url, "Token request");

        let response = self
            .http
            .post(self.config.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| {
                let detail = if e.is_timeout() {
                    "token endpoint timed out".to_owned()
                } else {
                    format!("token endpoint unreachable: {e}")
                };
                grant.transport_error(&detail)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<OAuth2ErrorResponse>().await.unwrap_or_else(|_| {
                OAuth2ErrorResponse {
                    error: "unknown_error".to_owned(),
                    error_description: None,
                }
            });
            warn!(grant = grant.label(), %status, error = %body.error, "Token endpoint refused request");
            return Err(grant.rejection(status, &body));
        }

        let raw = response
            .json::<models::RawTokenResponse>()
            .await
            .map_err(|e| grant.transport_error(&format!("malformed token response: {e}")))?;

        if raw.access_token.is_empty() {
            return Err(grant.transport_error("token response has an empty access_token"));
        }

        Ok(raw.into())
    }
}
