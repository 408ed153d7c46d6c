// ABOUTME: Unified error type for the relay, the launcher and the worker
// ABOUTME: ErrorCode carries the Unauthenticated / Forbidden / NotFound taxonomy plus JSON-RPC mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! Error handling
//!
//! Every fallible operation returns [`AppResult`]. The [`ErrorCode`] decides three
//! things: the taxonomy bucket a failure falls into, the JSON-RPC error code the
//! worker puts on the wire, and the process exit code of the launcher.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::jsonrpc::{
    ERROR_FORBIDDEN, ERROR_INTERNAL_ERROR, ERROR_INVALID_PARAMS, ERROR_NOT_FOUND,
    ERROR_UNAUTHENTICATED,
};

/// Remediation shown with every authentication failure
pub const REAUTH_HINT: &str = "run `engify-cli auth login` again";

/// Exit code used when the launcher refuses to start for authentication reasons (`EX_NOPERM`)
pub const EXIT_AUTH_FAILURE: i32 = 77;

/// Exit code for every other launcher failure
pub const EXIT_FAILURE: i32 = 1;

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No credential present (no refresh token, no handoff)
    AuthRequired,
    /// Credential present but rejected (bad signature, audience, issuer, grant)
    AuthInvalid,
    /// Credential expired
    AuthExpired,
    /// Authenticated but not allowed (OBO exchange denied)
    PermissionDenied,
    /// Record absent, or owned by someone else
    ResourceNotFound,
    /// Malformed or disallowed input
    InvalidInput,
    /// Bad or missing configuration
    ConfigError,
    /// Upstream service failed for a non-auth reason
    ExternalServiceError,
    /// Record store failure
    DatabaseError,
    /// User aborted an interactive flow
    Cancelled,
    /// Anything else
    InternalError,
}

/// Taxonomy bucket, as seen by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// No or invalid credential
    Unauthenticated,
    /// Credential valid, access refused
    Forbidden,
    /// Nothing visible at that id
    NotFound,
    /// Everything else
    Other,
}

impl ErrorCode {
    /// Taxonomy bucket for this code
    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::AuthRequired | Self::AuthInvalid | Self::AuthExpired => {
                ErrorClass::Unauthenticated
            }
            Self::PermissionDenied => ErrorClass::Forbidden,
            Self::ResourceNotFound => ErrorClass::NotFound,
            _ => ErrorClass::Other,
        }
    }

    /// JSON-RPC error code used by the worker
    #[must_use]
    pub const fn jsonrpc_code(self) -> i32 {
        match self {
            Self::AuthRequired | Self::AuthInvalid | Self::AuthExpired => ERROR_UNAUTHENTICATED,
            Self::PermissionDenied => ERROR_FORBIDDEN,
            Self::ResourceNotFound => ERROR_NOT_FOUND,
            Self::InvalidInput => ERROR_INVALID_PARAMS,
            Self::ConfigError
            | Self::ExternalServiceError
            | Self::DatabaseError
            | Self::Cancelled
            | Self::InternalError => ERROR_INTERNAL_ERROR,
        }
    }

    /// Process exit code the launcher uses for a failure of this kind
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self.class() {
            ErrorClass::Unauthenticated => EXIT_AUTH_FAILURE,
            _ => EXIT_FAILURE,
        }
    }

    /// Short human-readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication required",
            Self::AuthInvalid => "Authentication failed",
            Self::AuthExpired => "Authentication expired",
            Self::PermissionDenied => "Permission denied",
            Self::ResourceNotFound => "Not found",
            Self::InvalidInput => "Invalid input",
            Self::ConfigError => "Configuration error",
            Self::ExternalServiceError => "External service error",
            Self::DatabaseError => "Database error",
            Self::Cancelled => "Cancelled",
            Self::InternalError => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Application error
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Detail message. Must never contain token material.
    pub message: String,
}

/// Result alias used across the crate
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create an error with an explicit code
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// No credential available
    #[must_use]
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRequired, message)
    }

    /// Credential rejected
    #[must_use]
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Credential expired
    #[must_use]
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthExpired, message)
    }

    /// Access refused for an authenticated caller
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Resource not visible. The message is fixed per resource kind so that
    /// "absent" and "owned by another tenant" can never be told apart.
    #[must_use]
    pub fn not_found(resource: &str) -> Self {
        Self::new(ErrorCode::ResourceNotFound, format!("{resource} not found"))
    }

    /// Invalid caller input
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Configuration problem
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Upstream failure
    #[must_use]
    pub fn external_service(service: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{service}: {}", message.into()),
        )
    }

    /// Record store failure
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// User aborted
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }

    /// Unexpected internal failure
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Taxonomy bucket
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        self.code.class()
    }

    /// True for Unauthenticated failures
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self.code.class(), ErrorClass::Unauthenticated)
    }

    /// Message for a human at a terminal, with remediation for auth failures
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.is_auth_failure() {
            format!("{self}; {REAUTH_HINT}")
        } else {
            self.to_string()
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::invalid_input(format!("Invalid JSON: {error}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::internal(format!("I/O error: {error}"))
    }
}
