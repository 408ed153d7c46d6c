// ABOUTME: Model module root re-exporting identifiers, records and audit DTOs
// ABOUTME: UserId is the tenant key carried by every scoped query
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use std::fmt;

use serde::{Deserialize, Serialize};

/// Security audit event types
pub mod audit;
/// Tenant-owned record documents
pub mod record;

pub use audit::{AuditEvent, AuditEventType, AuditSeverity};
pub use record::{
    Collection, NewRecord, Record, RecordFilter, RecordPatch, RecordStatus, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};

/// Identifier of an Engify user, taken verbatim from the `sub` claim.
///
/// The authorization server issues opaque subject strings (database object ids),
/// so this is a string newtype rather than a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a subject string
    #[must_use]
    pub fn new(sub: impl Into<String>) -> Self {
        Self(sub.into())
    }

    /// Borrow the subject string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
