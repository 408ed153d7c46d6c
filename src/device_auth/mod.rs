// ABOUTME: One-time device login, logout and status for the Engify CLI
// ABOUTME: PKCE browser flow with loopback callback or manual paste; refresh token written to the keychain only on success
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! # Device authentication
//!
//! Establishes trust once per machine. The login flow runs a PKCE authorization
//! request in the system browser and receives the code on a loopback listener
//! (or as a pasted code when no browser can reach the machine). Nothing is
//! written to the keychain until the code has been exchanged and the returned
//! access token has passed the same audience checks the launcher applies.

/// Loopback redirect listener
pub mod callback;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use engify_core::models::UserId;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::environment::LoginConfig;
use crate::credentials::{CredentialStore, Secret};
use crate::errors::{AppError, AppResult};
use crate::jwks::TokenValidator;
use crate::oauth2_client::{generate_state, state_matches, OAuth2Client, PkceParams};
use crate::security::SecurityAuditor;

use callback::{CallbackParams, CallbackServer};

/// Opens the authorization URL for the user
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`; an error means the user must open it by hand
    ///
    /// # Errors
    /// Returns an error when no browser could be started
    fn open(&self, url: &Url) -> AppResult<()>;
}

/// The platform's default browser
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &Url) -> AppResult<()> {
        webbrowser::open(url.as_str())
            .map_err(|e| AppError::internal(format!("Could not open a browser: {e}")))
    }
}

/// Login behaviour switches
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Try to open the system browser
    pub open_browser: bool,
    /// Accept a pasted code or redirect URL on stdin
    pub allow_manual_paste: bool,
    /// How long to wait for the user
    pub timeout: Duration,
}

impl LoginOptions {
    /// Defaults from configuration: browser and paste both enabled
    #[must_use]
    pub const fn from_config(config: &LoginConfig) -> Self {
        Self {
            open_browser: true,
            allow_manual_paste: true,
            timeout: config.timeout,
        }
    }
}

/// Result of a completed login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Logged-in user
    pub user_id: UserId,
    /// Audience the stored credential yields tokens for
    pub audience: String,
}

/// What `auth status` reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStatus {
    /// No refresh token stored
    LoggedOut,
    /// A refresh token is stored; not checked against the server
    Stored,
    /// The stored refresh token yields a valid access token
    Valid {
        /// Token subject
        user_id: UserId,
        /// Access token expiry
        expires_at: DateTime<Utc>,
    },
    /// The stored refresh token no longer works
    Rejected {
        /// Why it was rejected
        reason: String,
    },
}

/// Runs login, logout and status against one keychain entry
pub struct DeviceAuthenticator {
    oauth: OAuth2Client,
    store: Arc<dyn CredentialStore>,
    login_config: LoginConfig,
    browser: Box<dyn BrowserLauncher>,
    auditor: SecurityAuditor,
}

impl DeviceAuthenticator {
    /// Authenticator using the system browser
    #[must_use]
    pub fn new(oauth: OAuth2Client, store: Arc<dyn CredentialStore>, login_config: LoginConfig) -> Self {
        Self::with_browser(oauth, store, login_config, Box::new(SystemBrowser))
    }

    /// Authenticator with a custom browser launcher
    #[must_use]
    pub fn with_browser(
        oauth: OAuth2Client,
        store: Arc<dyn CredentialStore>,
        login_config: LoginConfig,
        browser: Box<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            oauth,
            store,
            login_config,
            browser,
            auditor: SecurityAuditor::new("cli"),
        }
    }

    /// Interactive login reading pasted codes from the terminal
    ///
    /// # Errors
    /// See [`Self::login_with_input`]
    pub async fn login(&self, options: &LoginOptions) -> AppResult<LoginOutcome> {
        let stdin = BufReader::new(tokio::io::stdin());
        self.login_with_input(options, options.allow_manual_paste.then_some(stdin))
            .await
    }

    /// Login with an explicit source of pasted input
    ///
    /// # Errors
    /// - `Cancelled` when the user denies access, presses Ctrl-C or the wait times out
    /// - `AuthInvalid` when the state does not match or the server rejects the code
    /// - Keychain errors when the refresh token cannot be stored
    pub async fn login_with_input<P>(
        &self,
        options: &LoginOptions,
        paste: Option<P>,
    ) -> AppResult<LoginOutcome>
    where
        P: AsyncBufRead + Unpin,
    {
        let result = self.run_login(options, paste).await;
        match &result {
            Ok(outcome) => self.auditor.log_login(&outcome.user_id, &outcome.audience),
            Err(e) => self.auditor.log_login_failed(&e.message),
        }
        result
    }

    async fn run_login<P>(&self, options: &LoginOptions, paste: Option<P>) -> AppResult<LoginOutcome>
    where
        P: AsyncBufRead + Unpin,
    {
        let pkce = PkceParams::generate();
        let state = generate_state();
        let mut server = CallbackServer::bind(self.login_config.callback_port).await?;
        let redirect_uri = server.redirect_uri().to_owned();
        let auth_url = self.oauth.authorization_url(&pkce, &state, &redirect_uri);

        let opened = options.open_browser
            && match self.browser.open(&auth_url) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Browser launch failed");
                    false
                }
            };

        if opened {
            eprintln!("Opened your browser to sign in to Engify.");
            eprintln!("If nothing happened, open this URL:\n\n  {auth_url}\n");
        } else {
            eprintln!("Open this URL in a browser to sign in to Engify:\n\n  {auth_url}\n");
        }
        if paste.is_some() {
            eprintln!("Or paste the code (or the full redirect URL) here and press Enter:");
        }

        let code = tokio::select! {
            received = server.next() => {
                let params = received
                    .ok_or_else(|| AppError::internal("Login callback listener stopped"))?;
                Self::code_from_callback(&params, &state)?
            }
            pasted = read_paste(paste) => {
                Self::code_from_paste(&pasted?, &state)?
            }
            _ = tokio::signal::ctrl_c() => {
                return Err(AppError::cancelled("Login cancelled"));
            }
            () = tokio::time::sleep(options.timeout) => {
                return Err(AppError::cancelled(format!(
                    "Timed out after {}s waiting for the browser login",
                    options.timeout.as_secs()
                )));
            }
        };
        server.shutdown().await;

        let tokens = self
            .oauth
            .exchange_code(&code, &pkce.code_verifier, &redirect_uri)
            .await?;

        let validator = TokenValidator::fetch(&self.oauth).await?;
        let validated = validator.validate(&tokens.access_token)?;

        let refresh_token = tokens.refresh_token.ok_or_else(|| {
            AppError::auth_invalid("Authorization server did not issue a refresh token")
        })?;

        self.store.set(&refresh_token)?;
        info!(user_id = %validated.user_id(), store = self.store.name(), "Login complete");

        Ok(LoginOutcome {
            user_id: validated.user_id().clone(),
            audience: validated.audience().to_owned(),
        })
    }

    fn code_from_callback(params: &CallbackParams, expected_state: &str) -> AppResult<String> {
        if let Some(error) = &params.error {
            let detail = params
                .error_description
                .as_deref()
                .map_or_else(|| error.clone(), |d| format!("{error}: {d}"));
            return Err(if error == "access_denied" {
                AppError::cancelled(format!("Login was cancelled in the browser ({detail})"))
            } else {
                AppError::auth_invalid(format!("Authorization failed: {detail}"))
            });
        }

        let returned_state = params.state.as_deref().unwrap_or_default();
        if !state_matches(expected_state, returned_state) {
            return Err(AppError::auth_invalid(
                "Login callback state does not match this login attempt",
            ));
        }

        params
            .code
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::auth_invalid("Login callback carried no authorization code"))
    }

    fn code_from_paste(pasted: &str, expected_state: &str) -> AppResult<String> {
        let pasted = pasted.trim();
        if pasted.is_empty() {
            return Err(AppError::cancelled("No code entered"));
        }

        // A full redirect URL carries state, so it gets the same checks as the callback
        if let Ok(url) = Url::parse(pasted) {
            let mut params = CallbackParams::default();
            for (key, value) in url.query_pairs() {
                match key.as_ref() {
                    "code" => params.code = Some(value.into_owned()),
                    "state" => params.state = Some(value.into_owned()),
                    "error" => params.error = Some(value.into_owned()),
                    "error_description" => params.error_description = Some(value.into_owned()),
                    _ => {}
                }
            }
            return Self::code_from_callback(&params, expected_state);
        }

        Ok(pasted.to_owned())
    }

    /// Revoke (best effort) and delete the stored refresh token.
    ///
    /// Returns whether a token was stored.
    ///
    /// # Errors
    /// Returns an error if the keychain entry cannot be removed
    pub async fn logout(&self) -> AppResult<bool> {
        let Some(refresh_token) = self.store.get()? else {
            debug!("Logout requested with no stored login");
            return Ok(false);
        };

        let revoked = match self.oauth.revoke(&refresh_token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Refresh token revocation failed; removing local copy anyway");
                false
            }
        };

        self.store.delete()?;
        self.auditor.log_logout(revoked);
        Ok(true)
    }

    /// Report the stored login, optionally checking it against the server
    ///
    /// # Errors
    /// Returns an error if the keychain cannot be read
    pub async fn status(&self, check: bool) -> AppResult<LoginStatus> {
        let Some(refresh_token) = self.store.get()? else {
            return Ok(LoginStatus::LoggedOut);
        };
        if !check {
            return Ok(LoginStatus::Stored);
        }

        match self.check_refresh(&refresh_token).await {
            Ok(status) => Ok(status),
            Err(e) if e.is_auth_failure() => Ok(LoginStatus::Rejected { reason: e.message }),
            Err(e) => Err(e),
        }
    }

    async fn check_refresh(&self, refresh_token: &Secret) -> AppResult<LoginStatus> {
        let tokens = self.oauth.refresh(refresh_token).await?;
        let validator = TokenValidator::fetch(&self.oauth).await?;
        let validated = validator.validate(&tokens.access_token)?;

        // Keep the keychain usable if the server rotated the token during the check
        if let Some(rotated) = tokens.refresh_token.filter(|t| t != refresh_token) {
            self.store.set(&rotated)?;
        }

        Ok(LoginStatus::Valid {
            user_id: validated.user_id().clone(),
            expires_at: validated.expires_at(),
        })
    }
}

/// Read one line of pasted input; never completes when paste is disabled
async fn read_paste<P>(paste: Option<P>) -> AppResult<String>
where
    P: AsyncBufRead + Unpin,
{
    let Some(mut reader) = paste else {
        return std::future::pending().await;
    };
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    if read == 0 {
        // Stdin closed (not a terminal); keep waiting for the browser
        return std::future::pending().await;
    }
    Ok(line)
}
