// ABOUTME: Structured logging setup for all three binaries
// ABOUTME: tracing-subscriber with EnvFilter, text or JSON output, always on stderr
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! Logging
//!
//! Stdout belongs to the MCP host: the launcher relays it and the worker writes
//! protocol frames to it. Every log line therefore goes to stderr, which the host
//! treats as diagnostics.

use std::io;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::environment::LogFormat;
use crate::errors::{AppError, AppResult};

/// Install the global subscriber.
///
/// `default_directive` applies when `RUST_LOG` is unset (e.g. `"info"` for the
/// CLI, `"warn"` for the launcher so the host log stays quiet).
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init(format: LogFormat, default_directive: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let result = match format {
        LogFormat::Text => Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init(),
        LogFormat::Json => Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(false)
                    .flatten_event(true),
            )
            .try_init(),
    };

    result.map_err(|e| AppError::internal(format!("Failed to initialize logging: {e}")))
}
