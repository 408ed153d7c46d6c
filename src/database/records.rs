// ABOUTME: Database operations for tenant-owned records
// ABOUTME: list/get/create/update/archive/count, each bound to the TenantScope owner
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use chrono::{DateTime, Utc};
use engify_core::models::{
    NewRecord, Record, RecordFilter, RecordPatch, RecordStatus, UserId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;
use uuid::Uuid;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::tenant::TenantScope;

const RECORD_COLUMNS: &str =
    "id, owner_id, collection, title, body, status, created_at, updated_at";

impl Database {
    /// List the caller's records, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded
    pub async fn list_records(
        &self,
        scope: &TenantScope,
        filter: &RecordFilter,
    ) -> AppResult<Vec<Record>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {RECORD_COLUMNS} FROM records WHERE owner_id = "));
        query.push_bind(scope.user_id().as_str());

        if let Some(collection) = filter.collection {
            query.push(" AND collection = ").push_bind(collection.as_str());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(needle) = filter.title_contains.as_deref().filter(|n| !n.is_empty()) {
            query
                .push(" AND LOWER(title) LIKE ")
                .push_bind(format!("%{}%", escape_like(&needle.to_lowercase())))
                .push(" ESCAPE '\\'");
        }

        query
            .push(" ORDER BY updated_at DESC, id ASC LIMIT ")
            .push_bind(i64::from(filter.effective_limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset.unwrap_or(0)));

        let rows = query
            .build()
            .fetch_all(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to list records: {e}")))?;

        debug!(user_id = %scope.user_id(), count = rows.len(), "Listed records");
        rows.iter().map(row_to_record).collect()
    }

    /// Fetch one of the caller's records.
    ///
    /// A record owned by someone else is reported exactly like a missing one.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no record with that id belongs to the caller
    pub async fn get_record(&self, scope: &TenantScope, id: Uuid) -> AppResult<Record> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1 AND owner_id = ?2"
        ))
        .bind(id.to_string())
        .bind(scope.user_id().as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get record: {e}")))?;

        row.as_ref()
            .map_or_else(|| Err(AppError::not_found("Record")), row_to_record)
    }

    /// Create a record owned by the caller
    ///
    /// # Errors
    ///
    /// Returns an error if the title is empty or the insert fails
    pub async fn create_record(&self, scope: &TenantScope, new: &NewRecord) -> AppResult<Record> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_input("Record title must not be empty"));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let body = serde_json::to_string(&new.body)?;

        sqlx::query(
            r"
            INSERT INTO records (id, owner_id, collection, title, body, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ",
        )
        .bind(id.to_string())
        .bind(scope.user_id().as_str())
        .bind(new.collection.as_str())
        .bind(title)
        .bind(&body)
        .bind(new.status.as_str())
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create record: {e}")))?;

        debug!(user_id = %scope.user_id(), record_id = %id, "Created record");
        self.get_record(scope, id).await
    }

    /// Apply a partial update to one of the caller's records
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for missing or foreign records, `InvalidInput` for
    /// an empty patch or title
    pub async fn update_record(
        &self,
        scope: &TenantScope,
        id: Uuid,
        patch: &RecordPatch,
    ) -> AppResult<Record> {
        if patch.is_empty() {
            return Err(AppError::invalid_input("Update must change at least one field"));
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE records SET updated_at = ");
        query.push_bind(Utc::now().to_rfc3339());

        if let Some(title) = &patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(AppError::invalid_input("Record title must not be empty"));
            }
            query.push(", title = ").push_bind(title.to_owned());
        }
        if let Some(body) = &patch.body {
            query.push(", body = ").push_bind(serde_json::to_string(body)?);
        }
        if let Some(status) = patch.status {
            query.push(", status = ").push_bind(status.as_str());
        }

        query
            .push(" WHERE id = ")
            .push_bind(id.to_string())
            .push(" AND owner_id = ")
            .push_bind(scope.user_id().as_str());

        let result = query
            .build()
            .execute(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to update record: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Record"));
        }

        debug!(user_id = %scope.user_id(), record_id = %id, "Updated record");
        self.get_record(scope, id).await
    }

    /// Soft-delete one of the caller's records
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for missing or foreign records
    pub async fn archive_record(&self, scope: &TenantScope, id: Uuid) -> AppResult<Record> {
        let patch = RecordPatch {
            status: Some(RecordStatus::Archived),
            ..RecordPatch::default()
        };
        self.update_record(scope, id, &patch).await
    }

    /// Number of records the caller owns
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_records(&self, scope: &TenantScope) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM records WHERE owner_id = ?1")
            .bind(scope.user_id().as_str())
            .fetch_one(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to count records: {e}")))
    }
}

fn row_to_record(row: &SqliteRow) -> AppResult<Record> {
    let id: String = row.get("id");
    let owner_id: String = row.get("owner_id");
    let collection: String = row.get("collection");
    let body: String = row.get("body");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Record {
        id: Uuid::parse_str(&id)
            .map_err(|e| AppError::database(format!("Invalid record id '{id}': {e}")))?,
        owner_id: UserId::new(owner_id),
        collection: collection.parse().map_err(AppError::database)?,
        title: row.get("title"),
        body: serde_json::from_str(&body)
            .map_err(|e| AppError::database(format!("Invalid record body: {e}")))?,
        status: status.parse().map_err(AppError::database)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp '{value}': {e}")))
}

/// Escape LIKE wildcards so a title search is a plain substring match
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
