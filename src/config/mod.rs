// ABOUTME: Configuration module root
// ABOUTME: Environment-only configuration shared by the CLI, launcher and worker
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

/// Environment-based configuration
pub mod environment;
