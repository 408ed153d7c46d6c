// ABOUTME: Tenant-owned record model used by the worker's data tools
// ABOUTME: Record, NewRecord, RecordPatch and RecordFilter DTOs plus status/collection enums
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Default page size for record listings
pub const DEFAULT_LIST_LIMIT: u32 = 50;
/// Upper bound on page size for record listings
pub const MAX_LIST_LIMIT: u32 = 200;

/// Collections a record can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Saved prompt templates
    PromptTemplates,
    /// Workbench conversations
    Conversations,
    /// Bug reports filed from the workbench
    BugReports,
    /// News feed configurations
    FeedConfigs,
    /// Free-form notes
    Notes,
}

impl Collection {
    /// Storage name of the collection
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PromptTemplates => "prompt_templates",
            Self::Conversations => "conversations",
            Self::BugReports => "bug_reports",
            Self::FeedConfigs => "feed_configs",
            Self::Notes => "notes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt_templates" => Ok(Self::PromptTemplates),
            "conversations" => Ok(Self::Conversations),
            "bug_reports" => Ok(Self::BugReports),
            "feed_configs" => Ok(Self::FeedConfigs),
            "notes" => Ok(Self::Notes),
            other => Err(format!("unknown collection '{other}'")),
        }
    }
}

/// Lifecycle status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Not yet published
    #[default]
    Draft,
    /// In use
    Active,
    /// Soft-deleted
    Archived,
}

impl RecordStatus {
    /// Storage name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown record status '{other}'")),
        }
    }
}

/// A record owned by exactly one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identifier
    pub id: Uuid,
    /// Owning user (the tenant boundary)
    pub owner_id: UserId,
    /// Collection the record belongs to
    pub collection: Collection,
    /// Display title
    pub title: String,
    /// Arbitrary JSON payload
    pub body: serde_json::Value,
    /// Lifecycle status
    pub status: RecordStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a record. The owner is never part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewRecord {
    /// Target collection
    pub collection: Collection,
    /// Display title
    pub title: String,
    /// JSON payload
    #[serde(default)]
    pub body: serde_json::Value,
    /// Initial status
    #[serde(default)]
    pub status: RecordStatus,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordPatch {
    /// New title
    pub title: Option<String>,
    /// New payload
    pub body: Option<serde_json::Value>,
    /// New status
    pub status: Option<RecordStatus>,
}

impl RecordPatch {
    /// True when the patch would change nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.status.is_none()
    }
}

/// Listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordFilter {
    /// Restrict to one collection
    pub collection: Option<Collection>,
    /// Restrict to one status
    pub status: Option<RecordStatus>,
    /// Case-insensitive title substring
    pub title_contains: Option<String>,
    /// Page size, clamped to [`MAX_LIST_LIMIT`]
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

impl RecordFilter {
    /// Effective page size
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}
