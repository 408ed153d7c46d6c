// ABOUTME: Security audit logging for login, token handling, worker spawn and tenant-boundary events
// ABOUTME: Emits AuditEvents as structured tracing records under the security_audit target
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! # Security Audit Module
//!
//! Audit trail for the credential relay. Events go to the `security_audit`
//! tracing target on stderr; nothing here ever receives token material, only
//! user ids, audiences and outcomes.

use engify_core::models::UserId;
use tracing::{error, info, warn};

pub use engify_core::models::{AuditEvent, AuditEventType, AuditSeverity};

/// Audit logger for one process role
#[derive(Debug, Clone, Copy)]
pub struct SecurityAuditor {
    component: &'static str,
}

impl SecurityAuditor {
    /// Auditor tagging events with the emitting component ("cli", "launcher", "worker")
    #[must_use]
    pub const fn new(component: &'static str) -> Self {
        Self { component }
    }

    /// Component name attached to every event
    #[must_use]
    pub const fn component(&self) -> &'static str {
        self.component
    }

    /// Log an audit event
    pub fn log_event(&self, event: &AuditEvent) {
        match event.severity {
            AuditSeverity::Info => info!(
                target: "security_audit",
                event_id = %event.event_id,
                event_type = ?event.event_type,
                component = event.component,
                user_id = ?event.user_id,
                resource = ?event.resource,
                result = %event.result,
                metadata = %event.metadata,
                "Security audit event: {}",
                event.description
            ),
            AuditSeverity::Warning => warn!(
                target: "security_audit",
                event_id = %event.event_id,
                event_type = ?event.event_type,
                component = event.component,
                user_id = ?event.user_id,
                resource = ?event.resource,
                result = %event.result,
                metadata = %event.metadata,
                "Security audit warning: {}",
                event.description
            ),
            AuditSeverity::Error => error!(
                target: "security_audit",
                event_id = %event.event_id,
                event_type = ?event.event_type,
                component = event.component,
                user_id = ?event.user_id,
                resource = ?event.resource,
                result = %event.result,
                metadata = %event.metadata,
                "Security audit error: {}",
                event.description
            ),
            AuditSeverity::Critical => error!(
                target: "security_audit",
                event_id = %event.event_id,
                event_type = ?event.event_type,
                component = event.component,
                user_id = ?event.user_id,
                resource = ?event.resource,
                result = %event.result,
                metadata = %event.metadata,
                "CRITICAL security audit event: {}",
                event.description
            ),
        }
    }

    fn event(
        &self,
        event_type: AuditEventType,
        severity: AuditSeverity,
        description: impl Into<String>,
        result: &str,
    ) -> AuditEvent {
        AuditEvent::new(event_type, severity, self.component, description, result)
    }

    /// One-time login stored a refresh token
    pub fn log_login(&self, user_id: &UserId, audience: &str) {
        let event = self
            .event(
                AuditEventType::DeviceLogin,
                AuditSeverity::Info,
                "Refresh token stored after browser login",
                "success",
            )
            .with_user_id(user_id.clone())
            .with_resource(format!("audience:{audience}"));
        self.log_event(&event);
    }

    /// Login did not complete
    pub fn log_login_failed(&self, reason: &str) {
        let event = self.event(
            AuditEventType::DeviceLoginFailed,
            AuditSeverity::Warning,
            format!("Login did not complete: {reason}"),
            "failure",
        );
        self.log_event(&event);
    }

    /// Refresh token removed
    pub fn log_logout(&self, revoked: bool) {
        let event = self
            .event(
                AuditEventType::DeviceLogout,
                AuditSeverity::Info,
                "Refresh token removed from keychain",
                "success",
            )
            .with_metadata(serde_json::json!({ "revoked": revoked }));
        self.log_event(&event);
    }

    /// Refresh token exchanged for a validated access token
    pub fn log_token_refreshed(&self, user_id: &UserId, audience: &str, rotated: bool) {
        let event = self
            .event(
                AuditEventType::TokenRefreshed,
                AuditSeverity::Info,
                "Access token issued for the tool server",
                "success",
            )
            .with_user_id(user_id.clone())
            .with_resource(format!("audience:{audience}"))
            .with_metadata(serde_json::json!({ "refresh_token_rotated": rotated }));
        self.log_event(&event);
    }

    /// An access token failed local validation
    pub fn log_token_rejected(&self, reason: &str) {
        let event = self.event(
            AuditEventType::TokenRejected,
            AuditSeverity::Error,
            format!("Access token rejected: {reason}"),
            "denied",
        );
        self.log_event(&event);
    }

    /// Worker started under a validated identity
    pub fn log_worker_spawned(&self, user_id: &UserId, pid: Option<u32>) {
        let event = self
            .event(
                AuditEventType::WorkerSpawned,
                AuditSeverity::Info,
                "Worker started with validated identity",
                "success",
            )
            .with_user_id(user_id.clone())
            .with_metadata(serde_json::json!({ "pid": pid }));
        self.log_event(&event);
    }

    /// A tool call tried to cross the tenant boundary
    pub fn log_tenant_access_denied(&self, user_id: &UserId, tool: &str, argument: &str) {
        let event = self
            .event(
                AuditEventType::TenantAccessDenied,
                AuditSeverity::Critical,
                format!("Tool '{tool}' called with owner argument '{argument}'"),
                "denied",
            )
            .with_user_id(user_id.clone())
            .with_resource(format!("tool:{tool}"));
        self.log_event(&event);
    }

    /// On-behalf-of exchange outcome
    pub fn log_on_behalf_of(&self, user_id: &UserId, audience: &str, granted: bool) {
        let event = if granted {
            self.event(
                AuditEventType::OnBehalfOfExchange,
                AuditSeverity::Info,
                "Delegated token issued for downstream service",
                "success",
            )
        } else {
            self.event(
                AuditEventType::OnBehalfOfDenied,
                AuditSeverity::Warning,
                "Delegated token request denied",
                "denied",
            )
        };
        let event = event
            .with_user_id(user_id.clone())
            .with_resource(format!("audience:{audience}"));
        self.log_event(&event);
    }
}
