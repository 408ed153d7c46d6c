// ABOUTME: Tenant scope derived from a validated access token
// ABOUTME: The only way to name an owner in a data query; fixed at worker start
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use chrono::{DateTime, Utc};
use engify_core::models::UserId;

use crate::credentials::Secret;
use crate::jwks::ValidatedToken;

/// Identity every worker operation runs under.
///
/// Built once from a [`ValidatedToken`]. Record store methods take a
/// `&TenantScope` instead of a user id, so no call site can ask for another
/// tenant's rows.
#[derive(Debug, Clone)]
pub struct TenantScope {
    user_id: UserId,
    access_token: Secret,
    expires_at: DateTime<Utc>,
}

impl TenantScope {
    /// Scope for the subject of a validated token
    #[must_use]
    pub fn from_token(token: &ValidatedToken) -> Self {
        Self {
            user_id: token.user_id().clone(),
            access_token: token.token().clone(),
            expires_at: token.expires_at(),
        }
    }

    /// Owner id applied to every query
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The worker's access token, used as the subject of on-behalf-of exchanges
    #[must_use]
    pub const fn access_token(&self) -> &Secret {
        &self.access_token
    }

    /// When the underlying token expires
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
