// ABOUTME: Semantic search client that calls the search backend with a delegated token
// ABOUTME: RFC 8693 on-behalf-of exchange from the worker's token, cached until shortly before expiry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! Search integration
//!
//! The worker never forwards its own access token to another service. For each
//! downstream audience it exchanges that token for a narrower one and sends only
//! the narrower token.

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::environment::SearchConfig;
use crate::constants::defaults::OBO_REFRESH_MARGIN_SECS;
use crate::credentials::Secret;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::oauth2_client::OAuth2Client;
use crate::security::SecurityAuditor;
use crate::tenant::TenantScope;

/// Search request body
#[derive(Debug, Clone, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: u32,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Record id
    pub id: String,
    /// Record title
    #[serde(default)]
    pub title: Option<String>,
    /// Relevance score
    #[serde(default)]
    pub score: f64,
    /// Matching excerpt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Search response body
#[derive(Debug, Clone, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

struct DelegatedToken {
    token: Secret,
    expires_at: DateTime<Utc>,
}

impl DelegatedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(OBO_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Client for the semantic search backend
pub struct SearchClient {
    oauth: OAuth2Client,
    http: Client,
    config: SearchConfig,
    auditor: SecurityAuditor,
    cached: Mutex<Option<DelegatedToken>>,
}

impl SearchClient {
    /// Build a search client sharing the OAuth client's timeout
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(oauth: OAuth2Client, config: SearchConfig, auditor: SecurityAuditor) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(oauth.config().http_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            oauth,
            http,
            config,
            auditor,
            cached: Mutex::new(None),
        })
    }

    /// Audience of the delegated token
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.config.audience
    }

    /// Run a search as the scope's user
    ///
    /// # Errors
    /// `PermissionDenied` when the exchange is refused or the backend answers 401/403,
    /// `ExternalServiceError` for any other backend failure
    pub async fn search(
        &self,
        scope: &TenantScope,
        query: &str,
        limit: u32,
    ) -> AppResult<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(AppError::invalid_input("Search query must not be empty"));
        }

        let token = self.delegated_token(scope).await?;
        let url = self
            .config
            .base_url
            .join("v1/search")
            .map_err(|e| AppError::config(format!("Invalid search URL: {e}")))?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token.expose())
            .json(&SearchRequest { query, limit })
            .send()
            .await
            .map_err(|e| AppError::external_service("search backend", e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Drop the cached token; the backend no longer accepts it
                self.cached.lock().await.take();
                return Err(AppError::forbidden(format!(
                    "Search backend refused the delegated token ({})",
                    response.status()
                )));
            }
            status => {
                return Err(AppError::external_service(
                    "search backend",
                    format!("returned {status}"),
                ))
            }
        }

        let body = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| AppError::external_service("search backend", format!("malformed response: {e}")))?;

        debug!(user_id = %scope.user_id(), hits = body.results.len(), "Search completed");
        Ok(body.results)
    }

    async fn delegated_token(&self, scope: &TenantScope) -> AppResult<Secret> {
        let mut cached = self.cached.lock().await;
        if let Some(existing) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(existing.token.clone());
        }

        let exchanged = self
            .oauth
            .exchange_on_behalf_of(scope.access_token(), &self.config.audience, &self.config.scope)
            .await;

        let tokens = match exchanged {
            Ok(tokens) => tokens,
            Err(e) => {
                if e.code == ErrorCode::PermissionDenied {
                    self.auditor
                        .log_on_behalf_of(scope.user_id(), &self.config.audience, false);
                }
                warn!(error = %e, audience = %self.config.audience, "On-behalf-of exchange failed");
                return Err(e);
            }
        };

        self.auditor
            .log_on_behalf_of(scope.user_id(), &self.config.audience, true);

        // The delegated token is never cached past the subject token's expiry
        let expires_at = tokens
            .expires_at
            .map_or_else(|| scope.expires_at(), |at| at.min(scope.expires_at()));
        let token = tokens.access_token.clone();
        *cached = Some(DelegatedToken {
            token: tokens.access_token,
            expires_at,
        });
        Ok(token)
    }
}
