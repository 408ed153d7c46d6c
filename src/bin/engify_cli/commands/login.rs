// ABOUTME: `engify-cli auth login` command
// ABOUTME: Runs the PKCE browser login and reports who was signed in
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use engify_mcp::config::environment::ServerConfig;
use engify_mcp::device_auth::{DeviceAuthenticator, LoginOptions};
use engify_mcp::errors::AppResult;
use tracing::info;

/// Sign in and store the refresh token
pub async fn run(
    authenticator: &DeviceAuthenticator,
    config: &ServerConfig,
    open_browser: bool,
    allow_manual_paste: bool,
) -> AppResult<()> {
    let options = LoginOptions {
        open_browser,
        allow_manual_paste,
        ..LoginOptions::from_config(&config.login)
    };

    info!(resource = %config.oauth.resource, "Starting Engify login");
    let outcome = authenticator.login(&options).await?;

    println!("Signed in as {}.", outcome.user_id);
    println!(
        "A refresh token for {} is stored in the OS keychain ({} / {}).",
        outcome.audience, config.keychain.service, config.keychain.account
    );
    println!("Point your MCP host at `engify-launcher` to use it.");
    Ok(())
}
