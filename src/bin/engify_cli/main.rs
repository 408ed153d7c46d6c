// ABOUTME: Engify command-line tool for the one-time device login
// ABOUTME: `auth login`, `auth logout` and `auth status` against the OS keychain entry
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! # engify-cli
//!
//! ```bash
//! # Sign in once per machine (opens the browser)
//! engify-cli auth login
//!
//! # Headless machine: print the URL and paste the code back
//! engify-cli auth login --no-browser
//!
//! # Is a login stored, and does it still work?
//! engify-cli auth status --check
//!
//! # Remove the stored login
//! engify-cli auth logout
//! ```

mod commands;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use engify_mcp::config::environment::{LogFormat, ServerConfig};
use engify_mcp::credentials::KeyringStore;
use engify_mcp::device_auth::DeviceAuthenticator;
use engify_mcp::errors::AppResult;
use engify_mcp::logging;
use engify_mcp::oauth2_client::OAuth2Client;

#[derive(Parser)]
#[command(name = "engify-cli", version, about = "Engify MCP login management")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the stored Engify login
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Sign in through the browser and store a refresh token in the OS keychain
    Login {
        /// Do not try to open a browser; print the URL instead
        #[arg(long)]
        no_browser: bool,
        /// Do not accept a pasted code on stdin
        #[arg(long)]
        no_paste: bool,
    },
    /// Revoke and remove the stored refresh token
    Logout,
    /// Show whether a login is stored
    Status {
        /// Also exchange the stored token to confirm it still works
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Logging format is part of the config; fall back to text to report the failure
            let _ = logging::init(LogFormat::Text, "warn");
            eprintln!("Error: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(config.log_format, "warn") {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ServerConfig) -> AppResult<()> {
    let oauth = OAuth2Client::new(config.oauth.clone())?;
    let store = Arc::new(KeyringStore::new(&config.keychain));
    let authenticator = DeviceAuthenticator::new(oauth, store, config.login.clone());

    match cli.command {
        Command::Auth { action } => match action {
            AuthCommand::Login {
                no_browser,
                no_paste,
            } => commands::login::run(&authenticator, &config, !no_browser, !no_paste).await,
            AuthCommand::Logout => commands::logout::run(&authenticator).await,
            AuthCommand::Status { check } => commands::status::run(&authenticator, &config, check).await,
        },
    }
}
