// ABOUTME: `engify-cli auth status` command
// ABOUTME: Reports whether a login is stored and, with --check, whether it still works
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use engify_mcp::config::environment::ServerConfig;
use engify_mcp::device_auth::{DeviceAuthenticator, LoginStatus};
use engify_mcp::errors::{AppError, AppResult};

/// Print the login status
pub async fn run(
    authenticator: &DeviceAuthenticator,
    config: &ServerConfig,
    check: bool,
) -> AppResult<()> {
    match authenticator.status(check).await? {
        LoginStatus::LoggedOut => Err(AppError::auth_required("No Engify login is stored")),
        LoginStatus::Stored => {
            println!(
                "Signed in (refresh token stored as {} / {}).",
                config.keychain.service, config.keychain.account
            );
            Ok(())
        }
        LoginStatus::Valid {
            user_id,
            expires_at,
        } => {
            println!("Signed in as {user_id}.");
            println!(
                "Issued a token for {} valid until {}.",
                config.oauth.resource,
                expires_at.to_rfc3339()
            );
            Ok(())
        }
        LoginStatus::Rejected { reason } => {
            println!("The stored login no longer works: {reason}");
            Err(AppError::auth_expired("Stored login was rejected"))
        }
    }
}
