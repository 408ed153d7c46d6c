// ABOUTME: Security module root for the credential relay
// ABOUTME: Hosts the security audit trail
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

/// Security audit logging
pub mod audit;

pub use audit::SecurityAuditor;
