// ABOUTME: Main library entry point for the Engify MCP credential relay
// ABOUTME: One-time PKCE login, credential-relay launcher and tenant-scoped stdio worker
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

#![deny(unsafe_code)]

//! # Engify MCP
//!
//! Gives AI tool hosts access to a user's Engify records without ever placing
//! a long-lived credential in the host's configuration.
//!
//! ## Flow
//!
//! 1. `engify-cli auth login` runs an OAuth 2.1 PKCE login in the browser once
//!    per machine and stores the refresh token in the OS keychain.
//! 2. The host runs `engify-launcher`. It exchanges the refresh token for a
//!    short-lived access token bound (RFC 8707) to the tool server, validates it
//!    against the issuer's JWKS, then spawns `engify-worker` and relays stdio.
//! 3. The worker validates the same token again, fixes its [`tenant::TenantScope`]
//!    to the token's `sub`, and serves MCP tools over newline-delimited JSON-RPC.
//!    Downstream services receive only RFC 8693 on-behalf-of tokens.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use engify_mcp::config::environment::ServerConfig;
//! use engify_mcp::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Tokens will be requested for {}", config.oauth.resource);
//!     Ok(())
//! }
//! ```

/// Environment-based configuration
pub mod config;

/// Application constants
pub mod constants;

/// OS keychain storage for the refresh token
pub mod credentials;

/// Tenant-scoped record store
pub mod database;

/// One-time login, logout and status
pub mod device_auth;

/// Unified error handling
pub mod errors;

/// JSON-RPC 2.0 message types
pub mod jsonrpc;

/// Access token validation against the issuer's JWKS
pub mod jwks;

/// Credential-relay launcher
pub mod launcher;

/// Logging setup
pub mod logging;

/// MCP worker
pub mod mcp;

/// Shared data models
pub mod models {
    pub use engify_core::models::*;
}

/// OAuth 2.1 client for the Engify authorization server
pub mod oauth2_client;

/// Semantic search through on-behalf-of tokens
pub mod search;

/// Security audit trail
pub mod security;

/// Tenant scope derived from a validated token
pub mod tenant;
