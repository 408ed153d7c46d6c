// ABOUTME: Tenant isolation for the MCP worker
// ABOUTME: Validates the handed-over token, fixes the TenantScope and refuses owner arguments in tool calls
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use serde_json::Value;
use tracing::warn;

use crate::constants::FORBIDDEN_OWNER_ARGUMENTS;
use crate::errors::{AppError, AppResult};
use crate::jwks::TokenValidator;
use crate::launcher::HandoffFrame;
use crate::security::SecurityAuditor;
use crate::tenant::TenantScope;

/// Establishes and enforces the worker's tenant boundary
pub struct TenantIsolation {
    auditor: SecurityAuditor,
}

impl TenantIsolation {
    /// Create a tenant isolation guard
    #[must_use]
    pub const fn new(auditor: SecurityAuditor) -> Self {
        Self { auditor }
    }

    /// Validate the handed-over token and derive the worker's scope.
    ///
    /// The `user_id` in the frame is only a cross-check; the scope always comes
    /// from the token's `sub`.
    ///
    /// # Errors
    /// Returns an authentication error when the token fails validation or names
    /// a different user than the frame
    pub fn establish(&self, handoff: &HandoffFrame, validator: &TokenValidator) -> AppResult<TenantScope> {
        let validated = validator.validate(&handoff.access_token).map_err(|e| {
            self.auditor.log_token_rejected(&e.message);
            e
        })?;

        if validated.user_id() != &handoff.user_id {
            warn!(
                handoff_user = %handoff.user_id,
                token_user = %validated.user_id(),
                "Handoff user does not match token subject"
            );
            self.auditor
                .log_token_rejected("handoff user id does not match token subject");
            return Err(AppError::auth_invalid(
                "Handoff user id does not match the access token subject",
            ));
        }

        Ok(TenantScope::from_token(&validated))
    }

    /// Refuse tool arguments that try to name an owner
    ///
    /// # Errors
    /// Returns `InvalidInput` when `arguments` carries a user or owner id
    pub fn check_arguments(&self, scope: &TenantScope, tool: &str, arguments: &Value) -> AppResult<()> {
        let Some(object) = arguments.as_object() else {
            return Ok(());
        };

        if let Some(name) = FORBIDDEN_OWNER_ARGUMENTS
            .iter()
            .find(|name| object.contains_key(**name))
        {
            self.auditor
                .log_tenant_access_denied(scope.user_id(), tool, name);
            return Err(AppError::invalid_input(format!(
                "Argument '{name}' is not accepted; records are always scoped to the signed-in user"
            )));
        }

        Ok(())
    }
}
