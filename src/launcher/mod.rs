// ABOUTME: Credential-relay launcher run by the AI tool host
// ABOUTME: Keychain read, refresh exchange, local validation, worker spawn, identity handoff and stdio relay
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! # Launcher
//!
//! The launcher is the only command a tool host is configured with. It never
//! serves requests itself: it turns the stored refresh token into a short-lived
//! access token bound to the tool server's audience, checks that token locally
//! and only then starts the worker. Any failure before the spawn ends the run;
//! no worker is ever started without a validated identity.

/// Handoff frame shared with the worker
pub mod handoff;
/// Worker process and stdio relay
pub mod relay;

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::config::environment::{HandoffMode, LauncherConfig};
use crate::credentials::CredentialStore;
use crate::errors::{AppError, AppResult, EXIT_FAILURE};
use crate::jwks::{TokenValidator, ValidatedToken};
use crate::oauth2_client::OAuth2Client;
use crate::security::SecurityAuditor;

pub use handoff::HandoffFrame;

/// Launcher for one host invocation
pub struct Launcher {
    oauth: OAuth2Client,
    store: Arc<dyn CredentialStore>,
    config: LauncherConfig,
    auditor: SecurityAuditor,
}

impl Launcher {
    /// Create a launcher
    #[must_use]
    pub fn new(
        oauth: OAuth2Client,
        store: Arc<dyn CredentialStore>,
        config: LauncherConfig,
    ) -> Self {
        Self {
            oauth,
            store,
            config,
            auditor: SecurityAuditor::new("launcher"),
        }
    }

    /// Obtain and validate an access token for the configured resource.
    ///
    /// A refresh token rotated by the server replaces the stored one.
    ///
    /// # Errors
    /// - `AuthRequired` when no refresh token is stored
    /// - `AuthExpired` or `AuthInvalid` when the exchange or validation fails
    pub async fn authenticate(&self) -> AppResult<ValidatedToken> {
        let refresh_token = self.store.get()?.ok_or_else(|| {
            AppError::auth_required(format!("No Engify login found in the {}", self.store.name()))
        })?;

        let tokens = self.oauth.refresh(&refresh_token).await?;

        let validator = TokenValidator::fetch(&self.oauth).await?;
        let validated = validator.validate(&tokens.access_token).map_err(|e| {
            self.auditor.log_token_rejected(&e.message);
            e
        })?;

        let rotated = tokens
            .refresh_token
            .as_ref()
            .filter(|new| **new != refresh_token);
        if let Some(new_refresh_token) = rotated {
            self.store.set(new_refresh_token)?;
            info!("Stored rotated refresh token");
        }

        self.auditor.log_token_refreshed(
            validated.user_id(),
            validated.audience(),
            rotated.is_some(),
        );
        Ok(validated)
    }

    /// Authenticate, start the worker and relay stdio until it exits.
    ///
    /// Returns the worker's exit code.
    ///
    /// # Errors
    /// Returns an error for any failure before the worker is running
    pub async fn run<R, W>(&self, host_in: R, host_out: W) -> AppResult<i32>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let validated = self.authenticate().await?;
        let frame = HandoffFrame::new(validated.user_id().clone(), validated.token().clone());

        let mut child = relay::spawn_worker(&self.config, &frame)?;
        self.auditor.log_worker_spawned(validated.user_id(), child.id());

        if self.config.handoff == HandoffMode::Stdin {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| AppError::internal("Worker stdin is not piped"))?;
            frame.write_to(stdin).await.map_err(|e| {
                AppError::internal(format!("Failed to hand credentials to worker: {}", e.message))
            })?;
        }
        drop(frame);

        let status = relay::relay(child, host_in, host_out).await?;
        let code = status.code().unwrap_or_else(|| {
            warn!(?status, "Worker terminated by signal");
            EXIT_FAILURE
        });
        Ok(code)
    }
}
