// ABOUTME: Environment-based configuration for OAuth endpoints, keychain, launcher and worker
// ABOUTME: ServerConfig::from_env reads ENGIFY_* variables; from_lookup allows injecting a source
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::constants::{defaults, env_config, oauth};
use crate::errors::{AppError, AppResult};

/// How the launcher hands the validated identity to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandoffMode {
    /// First line on the worker's stdin pipe is a JSON handoff frame
    #[default]
    Stdin,
    /// `user_id` and `access_token` appended as positional arguments
    Argv,
}

impl FromStr for HandoffMode {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdin" | "pipe" => Ok(Self::Stdin),
            "argv" | "args" => Ok(Self::Argv),
            other => Err(AppError::config(format!(
                "{} must be 'stdin' or 'argv', got '{other}'",
                env_config::HANDOFF
            ))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(AppError::config(format!(
                "{} must be 'text' or 'json', got '{other}'",
                env_config::LOG_FORMAT
            ))),
        }
    }
}

/// OAuth client settings
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    /// Expected `iss` of every access token
    pub issuer: String,
    /// Public client id
    pub client_id: String,
    /// RFC 8707 resource indicator; also the required `aud`
    pub resource: String,
    /// Scopes requested at login
    pub scopes: Vec<String>,
    /// Authorization endpoint
    pub authorize_url: Url,
    /// Token endpoint (code, refresh and token exchange grants)
    pub token_url: Url,
    /// JWKS endpoint
    pub jwks_url: Url,
    /// Revocation endpoint
    pub revocation_url: Option<Url>,
    /// Bound on every OAuth round trip
    pub http_timeout: Duration,
}

/// Keychain entry coordinates
#[derive(Debug, Clone)]
pub struct KeychainConfig {
    /// Service name
    pub service: String,
    /// Account name
    pub account: String,
}

/// One-time login settings
#[derive(Debug, Clone)]
pub struct LoginConfig {
    /// Loopback port for the redirect, 0 for ephemeral
    pub callback_port: u16,
    /// How long to wait for the user
    pub timeout: Duration,
}

/// Launcher settings
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Worker executable
    pub worker_program: PathBuf,
    /// Fixed worker arguments placed before any handoff arguments
    pub worker_args: Vec<String>,
    /// Handoff mode
    pub handoff: HandoffMode,
}

/// Search backend settings
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Base URL of the search service
    pub base_url: Url,
    /// Audience requested in the on-behalf-of exchange
    pub audience: String,
    /// Scope requested in the on-behalf-of exchange
    pub scope: String,
}

/// Worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// sqlx SQLite URL of the record store
    pub database_url: String,
    /// Optional semantic search integration
    pub search: Option<SearchConfig>,
}

/// Complete configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// OAuth client
    pub oauth: OAuthClientConfig,
    /// Keychain
    pub keychain: KeychainConfig,
    /// Login
    pub login: LoginConfig,
    /// Launcher
    pub launcher: LauncherConfig,
    /// Worker
    pub worker: WorkerConfig,
    /// Log format
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    /// Returns a config error when a required variable is missing or a value is invalid
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// Returns a config error when a required variable is missing or a value is invalid
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| AppError::config(format!("{key} is not set")))
        };

        // Tokens must carry `iss` exactly as configured, trailing slash included
        let issuer = require(env_config::ISSUER_URL)?;
        parse_url(env_config::ISSUER_URL, &issuer)?;
        let issuer_base = issuer.trim_end_matches('/').to_owned();
        let endpoint = |key: &str, path: &str| -> AppResult<Url> {
            get(key).map_or_else(
                || parse_url(key, &format!("{issuer_base}{path}")),
                |value| parse_url(key, &value),
            )
        };

        let oauth = OAuthClientConfig {
            client_id: require(env_config::CLIENT_ID)?,
            resource: require(env_config::RESOURCE)?,
            scopes: get(env_config::SCOPES)
                .unwrap_or_else(|| defaults::SCOPES.to_owned())
                .split_whitespace()
                .map(str::to_owned)
                .collect(),
            authorize_url: endpoint(env_config::AUTHORIZE_URL, oauth::AUTHORIZE_PATH)?,
            token_url: endpoint(env_config::TOKEN_URL, oauth::TOKEN_PATH)?,
            jwks_url: endpoint(env_config::JWKS_URL, oauth::JWKS_PATH)?,
            revocation_url: Some(endpoint(env_config::REVOCATION_URL, oauth::REVOKE_PATH)?),
            http_timeout: Duration::from_secs(parse_number(
                env_config::HTTP_TIMEOUT_SECS,
                get(env_config::HTTP_TIMEOUT_SECS),
                defaults::HTTP_TIMEOUT_SECS,
            )?),
            issuer,
        };

        let keychain = KeychainConfig {
            service: get(env_config::KEYCHAIN_SERVICE)
                .unwrap_or_else(|| defaults::KEYCHAIN_SERVICE.to_owned()),
            account: get(env_config::KEYCHAIN_ACCOUNT)
                .unwrap_or_else(|| defaults::KEYCHAIN_ACCOUNT.to_owned()),
        };

        let login = LoginConfig {
            callback_port: parse_number(
                env_config::CALLBACK_PORT,
                get(env_config::CALLBACK_PORT),
                0,
            )?,
            timeout: Duration::from_secs(parse_number(
                env_config::LOGIN_TIMEOUT_SECS,
                get(env_config::LOGIN_TIMEOUT_SECS),
                defaults::LOGIN_TIMEOUT_SECS,
            )?),
        };

        let launcher = Self::launcher_config(
            get(env_config::WORKER_COMMAND),
            get(env_config::WORKER_ARGS),
            get(env_config::HANDOFF),
        )?;

        let search = match (get(env_config::SEARCH_URL), get(env_config::SEARCH_AUDIENCE)) {
            (Some(url), Some(audience)) => Some(SearchConfig {
                base_url: parse_url(env_config::SEARCH_URL, &url)?,
                audience,
                scope: get(env_config::SEARCH_SCOPE)
                    .unwrap_or_else(|| defaults::SEARCH_SCOPE.to_owned()),
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::config(format!(
                    "{} and {} must be set together",
                    env_config::SEARCH_URL,
                    env_config::SEARCH_AUDIENCE
                )))
            }
        };

        let worker = WorkerConfig {
            database_url: match get(env_config::DATABASE_URL) {
                Some(url) => url,
                None => default_database_url()?,
            },
            search,
        };

        let log_format = get(env_config::LOG_FORMAT)
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or_default();

        debug!(
            issuer = %oauth.issuer,
            resource = %oauth.resource,
            handoff = ?launcher.handoff,
            "Loaded configuration"
        );

        Ok(Self {
            oauth,
            keychain,
            login,
            launcher,
            worker,
            log_format,
        })
    }

    fn launcher_config(
        command: Option<String>,
        args: Option<String>,
        handoff: Option<String>,
    ) -> AppResult<LauncherConfig> {
        let handoff = handoff.map(|v| v.parse()).transpose()?.unwrap_or_default();
        let worker_args = args
            .map(|v| v.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();

        let worker_program = match command {
            Some(program) => PathBuf::from(program),
            None => {
                let exe = env::current_exe().map_err(|e| {
                    AppError::config(format!("Cannot locate launcher executable: {e}"))
                })?;
                exe.with_file_name(format!(
                    "{}{}",
                    defaults::WORKER_BINARY,
                    env::consts::EXE_SUFFIX
                ))
            }
        };

        Ok(LauncherConfig {
            worker_program,
            worker_args,
            handoff,
        })
    }
}

fn parse_url(key: &str, value: &str) -> AppResult<Url> {
    Url::parse(value).map_err(|e| AppError::config(format!("{key} is not a valid URL: {e}")))
}

fn parse_number<T: FromStr>(key: &str, value: Option<String>, default: T) -> AppResult<T> {
    value.map_or(Ok(default), |v| {
        v.parse()
            .map_err(|_| AppError::config(format!("{key} must be a number, got '{v}'")))
    })
}

fn default_database_url() -> AppResult<String> {
    let dir = dirs::data_dir()
        .ok_or_else(|| {
            AppError::config(format!(
                "No data directory on this platform; set {}",
                env_config::DATABASE_URL
            ))
        })?
        .join("engify");
    Ok(format!("sqlite://{}?mode=rwc", dir.join("records.db").display()))
}
