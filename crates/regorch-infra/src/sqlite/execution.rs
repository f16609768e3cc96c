//! SQLite execution store.
//!
//! Implements `ExecutionStore` from `regorch-core` on the
//! `workflow_executions` table. Every mutation runs in a transaction on the
//! single-connection writer pool, which makes insert-if-absent and the
//! terminal transitions atomic per key across all tasks of this process.
//!
//! `updated_at` is stored as fixed-width RFC 3339 (microseconds, `Z`), so
//! string comparison in SQL orders the same way as the timestamps.

use chrono::{DateTime, SecondsFormat, Utc};
use regorch_core::idempotency::{ExecutionStore, StorePolicy};
use regorch_types::error::StoreError;
use regorch_types::execution::{BeginOutcome, ExecutionEntry, ExecutionState};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::pool::DatabasePool;

const SELECT_ENTRY: &str = "SELECT key, operation, state, result_payload, error_message, updated_at \
     FROM workflow_executions WHERE key = ?";

/// SQLite-backed implementation of `ExecutionStore`.
pub struct SqliteExecutionStore {
    pool: DatabasePool,
    policy: StorePolicy,
}

impl SqliteExecutionStore {
    pub fn new(pool: DatabasePool, policy: StorePolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> StorePolicy {
        self.policy
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Timestamp at or before which entries are expired; `None` when the
    /// TTL reaches past the representable range.
    fn cutoff(&self, now: DateTime<Utc>) -> Option<String> {
        now.checked_sub_signed(self.policy.ttl_chrono())
            .map(|t| format_timestamp(&t))
    }

    async fn transition(
        &self,
        key: &str,
        state: ExecutionState,
        payload: Option<String>,
        message: Option<String>,
    ) -> Result<ExecutionEntry, StoreError> {
        let now = Utc::now();
        let cutoff = self.cutoff(now).unwrap_or_default();
        let mut tx = self.pool.writer.begin().await.map_err(backend)?;

        let updated = sqlx::query(
            "UPDATE workflow_executions \
             SET state = ?, result_payload = ?, error_message = ?, updated_at = ? \
             WHERE key = ? AND state = 'IN_PROGRESS' AND updated_at > ?",
        )
        .bind(state.to_string())
        .bind(&payload)
        .bind(&message)
        .bind(format_timestamp(&now))
        .bind(key)
        .bind(&cutoff)
        .execute(&mut *tx)
        .await
        .map_err(backend)?
        .rows_affected();

        let current = sqlx::query(SELECT_ENTRY)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .map(|row| ExecutionRow::from_row(&row).map_err(backend))
            .transpose()?
            .map(ExecutionRow::into_entry)
            .transpose()?;

        tx.commit().await.map_err(backend)?;

        match current {
            Some(entry) if updated == 1 => Ok(entry),
            Some(entry) if !self.policy.is_expired(&entry, now) => {
                Err(StoreError::InvalidTransition {
                    key: key.to_string(),
                    from: entry.state,
                })
            }
            _ => Err(StoreError::NotFound(key.to_string())),
        }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Internal row type for mapping SQLite rows to `ExecutionEntry`.
struct ExecutionRow {
    key: String,
    operation: String,
    state: String,
    result_payload: Option<String>,
    error_message: Option<String>,
    updated_at: String,
}

impl ExecutionRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            key: row.try_get("key")?,
            operation: row.try_get("operation")?,
            state: row.try_get("state")?,
            result_payload: row.try_get("result_payload")?,
            error_message: row.try_get("error_message")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_entry(self) -> Result<ExecutionEntry, StoreError> {
        let state: ExecutionState = self.state.parse().map_err(StoreError::Backend)?;
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|e| StoreError::Backend(format!("invalid updated_at: {e}")))?
            .with_timezone(&Utc);

        Ok(ExecutionEntry {
            key: self.key,
            operation: self.operation,
            state,
            result_payload: self.result_payload,
            error_message: self.error_message,
            updated_at,
        })
    }
}

impl ExecutionStore for SqliteExecutionStore {
    async fn try_begin(&self, key: &str, operation: &str) -> Result<BeginOutcome, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.writer.begin().await.map_err(backend)?;

        if let Some(cutoff) = self.cutoff(now) {
            sqlx::query("DELETE FROM workflow_executions WHERE key = ? AND updated_at <= ?")
                .bind(key)
                .bind(cutoff)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        let mut fresh = ExecutionEntry::in_progress(key, operation);
        let stamp = format_timestamp(&fresh.updated_at);
        let inserted = sqlx::query(
            "INSERT INTO workflow_executions (key, operation, state, result_payload, error_message, updated_at) \
             VALUES (?, ?, 'IN_PROGRESS', NULL, NULL, ?) \
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(operation)
        .bind(&stamp)
        .execute(&mut *tx)
        .await
        .map_err(backend)?
        .rows_affected();

        let outcome = if inserted == 1 {
            // Match the stored precision.
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&stamp) {
                fresh.updated_at = parsed.with_timezone(&Utc);
            }
            BeginOutcome::Owner(fresh)
        } else {
            let row = sqlx::query(SELECT_ENTRY)
                .bind(key)
                .fetch_one(&mut *tx)
                .await
                .map_err(backend)?;
            BeginOutcome::Existing(ExecutionRow::from_row(&row).map_err(backend)?.into_entry()?)
        };

        tx.commit().await.map_err(backend)?;
        Ok(outcome)
    }

    async fn complete(&self, key: &str, payload: String) -> Result<ExecutionEntry, StoreError> {
        self.transition(key, ExecutionState::Succeeded, Some(payload), None)
            .await
    }

    async fn fail(&self, key: &str, message: String) -> Result<ExecutionEntry, StoreError> {
        self.transition(key, ExecutionState::Failed, None, Some(message))
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<ExecutionEntry>, StoreError> {
        let row = sqlx::query(SELECT_ENTRY)
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let entry = ExecutionRow::from_row(&row).map_err(backend)?.into_entry()?;
        if self.policy.is_expired(&entry, Utc::now()) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn evict(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tx = self.pool.writer.begin().await.map_err(backend)?;
        let mut removed = 0u64;

        if let Some(cutoff) = self.cutoff(now) {
            removed += sqlx::query("DELETE FROM workflow_executions WHERE updated_at <= ?")
                .bind(cutoff)
                .execute(&mut *tx)
                .await
                .map_err(backend)?
                .rows_affected();
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workflow_executions")
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;
        let max = i64::try_from(self.policy.max_entries).unwrap_or(i64::MAX);
        if count > max {
            removed += sqlx::query(
                "DELETE FROM workflow_executions WHERE key IN \
                 (SELECT key FROM workflow_executions ORDER BY updated_at ASC LIMIT ?)",
            )
            .bind(count - max)
            .execute(&mut *tx)
            .await
            .map_err(backend)?
            .rows_affected();
        }

        tx.commit().await.map_err(backend)?;

        let removed = usize::try_from(removed).unwrap_or(usize::MAX);
        if removed > 0 {
            tracing::debug!(removed, "evicted execution rows");
        }
        Ok(removed)
    }
}
