//! Execution store port.
//!
//! The store maps an idempotency key to at most one `ExecutionEntry` and is
//! the single source of truth for "has this logical invocation already run".
//! Implementations must linearise every mutation per key. The in-memory
//! backend lives in this crate; `regorch-infra` provides a SQLite one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use regorch_types::config::IdempotencyConfig;
use regorch_types::error::StoreError;
use regorch_types::execution::{BeginOutcome, ExecutionEntry};

/// Retention policy shared by all store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Entries older than this (by `updated_at`) are treated as absent.
    pub ttl: Duration,
    /// Upper bound on retained entries after a sweep.
    pub max_entries: usize,
}

impl StorePolicy {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries }
    }

    /// TTL as a chrono duration, saturating for absurdly large values.
    pub fn ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX)
    }

    /// Whether an entry last updated at `updated_at` is expired at `now`.
    pub fn is_expired(&self, entry: &ExecutionEntry, now: DateTime<Utc>) -> bool {
        entry.is_expired(self.ttl_chrono(), now)
    }
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self::from(&IdempotencyConfig::default())
    }
}

impl From<&IdempotencyConfig> for StorePolicy {
    fn from(config: &IdempotencyConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }
}

/// Storage port for keyed workflow executions.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ExecutionStore: Send + Sync {
    /// Atomically insert a fresh `InProgress` entry if the key is absent
    /// (or its entry has expired).
    ///
    /// Of N concurrent calls for the same absent key, exactly one returns
    /// `BeginOutcome::Owner`; the others observe `Existing`.
    fn try_begin(
        &self,
        key: &str,
        operation: &str,
    ) -> impl std::future::Future<Output = Result<BeginOutcome, StoreError>> + Send;

    /// Transition `InProgress -> Succeeded` with the serialized result.
    fn complete(
        &self,
        key: &str,
        payload: String,
    ) -> impl std::future::Future<Output = Result<ExecutionEntry, StoreError>> + Send;

    /// Transition `InProgress -> Failed` with the error message.
    fn fail(
        &self,
        key: &str,
        message: String,
    ) -> impl std::future::Future<Output = Result<ExecutionEntry, StoreError>> + Send;

    /// Read the live entry for a key. Expired entries read as `None`.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<ExecutionEntry>, StoreError>> + Send;

    /// Drop expired entries, then the oldest entries beyond capacity.
    /// Returns how many entries were removed.
    fn evict(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<usize, StoreError>> + Send;
}

impl<T: ExecutionStore> ExecutionStore for std::sync::Arc<T> {
    fn try_begin(
        &self,
        key: &str,
        operation: &str,
    ) -> impl std::future::Future<Output = Result<BeginOutcome, StoreError>> + Send {
        (**self).try_begin(key, operation)
    }

    fn complete(
        &self,
        key: &str,
        payload: String,
    ) -> impl std::future::Future<Output = Result<ExecutionEntry, StoreError>> + Send {
        (**self).complete(key, payload)
    }

    fn fail(
        &self,
        key: &str,
        message: String,
    ) -> impl std::future::Future<Output = Result<ExecutionEntry, StoreError>> + Send {
        (**self).fail(key, message)
    }

    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<ExecutionEntry>, StoreError>> + Send {
        (**self).get(key)
    }

    fn evict(
        &self,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<usize, StoreError>> + Send {
        (**self).evict(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_config() {
        let config = IdempotencyConfig {
            ttl_secs: 5,
            max_entries: 10,
            ..Default::default()
        };
        let policy = StorePolicy::from(&config);
        assert_eq!(policy.ttl, Duration::from_secs(5));
        assert_eq!(policy.max_entries, 10);
    }

    #[test]
    fn test_policy_expiry() {
        let policy = StorePolicy::new(Duration::from_secs(5), 10);
        let entry = ExecutionEntry::in_progress("k", "op");
        assert!(!policy.is_expired(&entry, entry.updated_at));
        assert!(policy.is_expired(&entry, entry.updated_at + chrono::Duration::seconds(5)));
    }
}
