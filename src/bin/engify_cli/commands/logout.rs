// ABOUTME: `engify-cli auth logout` command
// ABOUTME: Revokes and deletes the stored refresh token
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use engify_mcp::device_auth::DeviceAuthenticator;
use engify_mcp::errors::AppResult;

/// Remove the stored login
pub async fn run(authenticator: &DeviceAuthenticator) -> AppResult<()> {
    if authenticator.logout().await? {
        println!("Signed out. The refresh token was removed from the OS keychain.");
    } else {
        println!("No Engify login is stored on this machine.");
    }
    Ok(())
}
