// ABOUTME: MCP tool catalogue and dispatch for the tenant-scoped worker
// ABOUTME: Record tools, search and whoami; every call runs under the worker's fixed TenantScope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use std::str::FromStr;

use engify_core::models::{NewRecord, RecordFilter, RecordPatch};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::search::SearchClient;
use crate::tenant::TenantScope;

use super::tenant_isolation::TenantIsolation;

/// Default number of search hits
const DEFAULT_SEARCH_LIMIT: u32 = 10;
/// Upper bound on search hits
const MAX_SEARCH_LIMIT: u32 = 50;

/// Tools exposed by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolId {
    /// Filtered listing of the caller's records
    ListRecords,
    /// One record by id
    GetRecord,
    /// New record
    CreateRecord,
    /// Partial update
    UpdateRecord,
    /// Soft delete
    ArchiveRecord,
    /// Semantic search through the delegated search backend
    SearchRecords,
    /// Identity of the worker's user
    WhoAmI,
}

impl ToolId {
    /// Every tool, in catalogue order
    pub const ALL: [Self; 7] = [
        Self::ListRecords,
        Self::GetRecord,
        Self::CreateRecord,
        Self::UpdateRecord,
        Self::ArchiveRecord,
        Self::SearchRecords,
        Self::WhoAmI,
    ];

    /// Wire name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ListRecords => "list_records",
            Self::GetRecord => "get_record",
            Self::CreateRecord => "create_record",
            Self::UpdateRecord => "update_record",
            Self::ArchiveRecord => "archive_record",
            Self::SearchRecords => "search_records",
            Self::WhoAmI => "whoami",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::ListRecords => {
                "List your Engify records, newest first. Filter by collection, status or title."
            }
            Self::GetRecord => "Fetch one of your records by id.",
            Self::CreateRecord => "Create a record in one of your collections.",
            Self::UpdateRecord => "Change the title, body or status of one of your records.",
            Self::ArchiveRecord => "Archive one of your records.",
            Self::SearchRecords => "Semantic search across your records.",
            Self::WhoAmI => "Show which Engify user this server is acting for.",
        }
    }

    fn input_schema(self) -> Value {
        let collection = json!({
            "type": "string",
            "enum": ["prompt_templates", "conversations", "bug_reports", "feed_configs", "notes"]
        });
        let status = json!({ "type": "string", "enum": ["draft", "active", "archived"] });
        let id = json!({ "type": "string", "format": "uuid", "description": "Record id" });

        match self {
            Self::ListRecords => json!({
                "type": "object",
                "properties": {
                    "collection": collection,
                    "status": status,
                    "title_contains": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 200 },
                    "offset": { "type": "integer", "minimum": 0 }
                },
                "additionalProperties": false
            }),
            Self::GetRecord | Self::ArchiveRecord => json!({
                "type": "object",
                "properties": { "id": id },
                "required": ["id"],
                "additionalProperties": false
            }),
            Self::CreateRecord => json!({
                "type": "object",
                "properties": {
                    "collection": collection,
                    "title": { "type": "string" },
                    "body": { "description": "Arbitrary JSON document" },
                    "status": status
                },
                "required": ["collection", "title"],
                "additionalProperties": false
            }),
            Self::UpdateRecord => json!({
                "type": "object",
                "properties": {
                    "id": id,
                    "title": { "type": "string" },
                    "body": { "description": "Arbitrary JSON document" },
                    "status": status
                },
                "required": ["id"],
                "additionalProperties": false
            }),
            Self::SearchRecords => json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": MAX_SEARCH_LIMIT }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
            Self::WhoAmI => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }

    /// Catalogue entry
    #[must_use]
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name(),
            description: self.description(),
            input_schema: self.input_schema(),
        }
    }
}

impl FromStr for ToolId {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| AppError::invalid_input(format!("Unknown tool '{s}'")))
    }
}

/// Tool entry returned by `tools/list`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name
    pub name: &'static str,
    /// What the tool does
    pub description: &'static str,
    /// JSON Schema of the arguments
    pub input_schema: Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordIdArgs {
    id: Uuid,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<u32>,
}

/// Everything a tool call can touch. The scope is fixed for the worker's life.
pub struct ToolContext {
    scope: TenantScope,
    database: Database,
    search: Option<SearchClient>,
    isolation: TenantIsolation,
}

impl ToolContext {
    /// Bundle the worker's resources
    #[must_use]
    pub fn new(
        scope: TenantScope,
        database: Database,
        search: Option<SearchClient>,
        isolation: TenantIsolation,
    ) -> Self {
        Self {
            scope,
            database,
            search,
            isolation,
        }
    }

    /// The worker's tenant scope
    #[must_use]
    pub const fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// Tools available in this worker
    #[must_use]
    pub fn available_tools(&self) -> Vec<ToolId> {
        ToolId::ALL
            .into_iter()
            .filter(|tool| *tool != ToolId::SearchRecords || self.search.is_some())
            .collect()
    }

    /// Run a tool and return its structured result
    ///
    /// # Errors
    /// Returns the tool's error; owner arguments are refused before any I/O
    pub async fn call(&self, name: &str, arguments: Value) -> AppResult<Value> {
        let tool: ToolId = name.parse()?;
        if !self.available_tools().contains(&tool) {
            return Err(AppError::invalid_input(format!("Tool '{name}' is not available")));
        }

        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => arguments,
            _ => return Err(AppError::invalid_input("Tool arguments must be an object")),
        };
        self.isolation
            .check_arguments(&self.scope, tool.name(), &arguments)?;

        match tool {
            ToolId::ListRecords => {
                let filter: RecordFilter = serde_json::from_value(arguments)?;
                let records = self.database.list_records(&self.scope, &filter).await?;
                Ok(json!({ "records": records, "count": records.len() }))
            }
            ToolId::GetRecord => {
                let args: RecordIdArgs = serde_json::from_value(arguments)?;
                let record = self.database.get_record(&self.scope, args.id).await?;
                Ok(serde_json::to_value(record)?)
            }
            ToolId::CreateRecord => {
                let new: NewRecord = serde_json::from_value(arguments)?;
                let record = self.database.create_record(&self.scope, &new).await?;
                Ok(serde_json::to_value(record)?)
            }
            ToolId::UpdateRecord => {
                let (id, patch) = split_update_arguments(arguments)?;
                let record = self.database.update_record(&self.scope, id, &patch).await?;
                Ok(serde_json::to_value(record)?)
            }
            ToolId::ArchiveRecord => {
                let args: RecordIdArgs = serde_json::from_value(arguments)?;
                let record = self.database.archive_record(&self.scope, args.id).await?;
                Ok(serde_json::to_value(record)?)
            }
            ToolId::SearchRecords => {
                let args: SearchArgs = serde_json::from_value(arguments)?;
                let search = self
                    .search
                    .as_ref()
                    .ok_or_else(|| AppError::config("Search is not configured"))?;
                let limit = args
                    .limit
                    .unwrap_or(DEFAULT_SEARCH_LIMIT)
                    .clamp(1, MAX_SEARCH_LIMIT);
                let hits = search.search(&self.scope, &args.query, limit).await?;
                Ok(json!({ "results": hits, "count": hits.len() }))
            }
            ToolId::WhoAmI => {
                let record_count = self.database.count_records(&self.scope).await?;
                Ok(json!({
                    "user_id": self.scope.user_id(),
                    "token_expires_at": self.scope.expires_at(),
                    "record_count": record_count
                }))
            }
        }
    }
}

/// `update_record` takes the id alongside the patch fields
fn split_update_arguments(arguments: Value) -> AppResult<(Uuid, RecordPatch)> {
    let Value::Object(mut fields) = arguments else {
        return Err(AppError::invalid_input("Tool arguments must be an object"));
    };
    let id = fields
        .remove("id")
        .ok_or_else(|| AppError::invalid_input("Missing required argument 'id'"))?;
    let id: Uuid = serde_json::from_value(id)?;
    let patch: RecordPatch = serde_json::from_value(Value::Object(fields))?;
    Ok((id, patch))
}
