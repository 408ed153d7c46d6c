// ABOUTME: Entry point configured in the AI tool host's MCP settings
// ABOUTME: Authenticates from the keychain, spawns the worker and relays stdio; exits 77 on auth failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! # engify-launcher
//!
//! Takes no arguments. Configuration comes from `ENGIFY_*` environment
//! variables set in the host's server entry. Stdout carries only the worker's
//! protocol output; diagnostics go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use engify_mcp::config::environment::{LogFormat, ServerConfig};
use engify_mcp::credentials::KeyringStore;
use engify_mcp::errors::{AppError, AppResult, EXIT_FAILURE};
use engify_mcp::launcher::Launcher;
use engify_mcp::logging;
use engify_mcp::oauth2_client::OAuth2Client;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "engify-launcher",
    version,
    about = "Start the Engify MCP worker with a freshly issued access token"
)]
struct Args {}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = Args::parse();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init(LogFormat::Text, "warn");
            return fail(&e);
        }
    };
    if let Err(e) = logging::init(config.log_format, "warn") {
        eprintln!("engify-launcher: {e}");
    }

    match run(config).await {
        Ok(code) => exit_code(code),
        Err(e) => fail(&e),
    }
}

async fn run(config: ServerConfig) -> AppResult<i32> {
    let oauth = OAuth2Client::new(config.oauth)?;
    let store = Arc::new(KeyringStore::new(&config.keychain));
    let launcher = Launcher::new(oauth, store, config.launcher);
    launcher.run(tokio::io::stdin(), tokio::io::stdout()).await
}

fn fail(error: &AppError) -> ExitCode {
    error!(code = ?error.code, "Launcher refused to start the worker: {}", error.message);
    eprintln!("engify-launcher: {}", error.user_message());
    exit_code(error.code.exit_code())
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map_or(ExitCode::from(EXIT_FAILURE as u8), ExitCode::from)
}
