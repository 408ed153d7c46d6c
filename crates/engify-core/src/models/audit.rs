// ABOUTME: Security audit event types for credential and tenant-boundary events
// ABOUTME: AuditEventType, AuditSeverity, and AuditEvent DTOs with builder pattern
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Types of audit events tracked by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Device authentication
    /// One-time login stored a refresh token
    DeviceLogin,
    /// Login was cancelled or rejected
    DeviceLoginFailed,
    /// Refresh token removed from the keychain
    DeviceLogout,

    // Launcher
    /// Refresh token exchanged for an access token
    TokenRefreshed,
    /// A freshly issued access token failed local validation
    TokenRejected,
    /// Worker process started with a validated identity
    WorkerSpawned,

    // Worker
    /// A tool call was refused at the tenant boundary
    TenantAccessDenied,
    /// On-behalf-of exchange for the search backend
    OnBehalfOfExchange,
    /// On-behalf-of exchange was denied
    OnBehalfOfDenied,
}

/// Severity levels for audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    /// Normal operation
    Info,
    /// Potential issue
    Warning,
    /// Operation failed
    Error,
    /// Possible security incident
    Critical,
}

/// Security audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier
    pub event_id: Uuid,
    /// Type of audit event
    pub event_type: AuditEventType,
    /// Severity level
    pub severity: AuditSeverity,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
    /// User the event concerns, once known
    pub user_id: Option<UserId>,
    /// Process role that emitted the event ("cli", "launcher", "worker")
    pub component: &'static str,
    /// Event description
    pub description: String,
    /// Additional event metadata. Never token material.
    pub metadata: serde_json::Value,
    /// Resource affected (e.g. "record:<id>", "audience:<uri>")
    pub resource: Option<String>,
    /// Result of the action ("success", "failure", "denied")
    pub result: String,
}

impl AuditEvent {
    /// Create a new audit event
    #[must_use]
    pub fn new(
        event_type: AuditEventType,
        severity: AuditSeverity,
        component: &'static str,
        description: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            severity,
            timestamp: Utc::now(),
            user_id: None,
            component,
            description: description.into(),
            metadata: serde_json::Value::Null,
            resource: None,
            result: result.into(),
        }
    }

    /// Set user ID for the event
    #[must_use]
    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set resource affected
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Add metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
