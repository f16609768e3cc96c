//! Store selection from `[idempotency]` config.

use std::path::Path;

use chrono::{DateTime, Utc};
use regorch_core::idempotency::{ExecutionStore, InMemoryExecutionStore, StorePolicy};
use regorch_types::config::{IdempotencyConfig, StoreBackend};
use regorch_types::error::StoreError;
use regorch_types::execution::{BeginOutcome, ExecutionEntry};

use crate::sqlite::{DatabasePool, SqliteExecutionStore, pool::default_database_url};

/// The execution store backend chosen at startup.
pub enum ConfiguredStore {
    Memory(InMemoryExecutionStore),
    Sqlite(SqliteExecutionStore),
}

impl ConfiguredStore {
    pub fn backend(&self) -> StoreBackend {
        match self {
            ConfiguredStore::Memory(_) => StoreBackend::Memory,
            ConfiguredStore::Sqlite(_) => StoreBackend::Sqlite,
        }
    }
}

/// Open the configured store. The SQLite backend defaults to
/// `{data_dir}/executions.db`, creating the directory if needed.
pub async fn open_store(
    config: &IdempotencyConfig,
    data_dir: &Path,
) -> Result<ConfiguredStore, StoreError> {
    let policy = StorePolicy::from(config);
    match config.backend {
        StoreBackend::Memory => Ok(ConfiguredStore::Memory(InMemoryExecutionStore::new(policy))),
        StoreBackend::Sqlite => {
            let url = match config.database_url.as_deref() {
                Some(url) => url.to_string(),
                None => {
                    tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
                        StoreError::Backend(format!(
                            "failed to create data directory {}: {e}",
                            data_dir.display()
                        ))
                    })?;
                    default_database_url(data_dir)
                }
            };
            let pool = DatabasePool::new(&url)
                .await
                .map_err(|e| StoreError::Backend(format!("failed to open {url}: {e}")))?;
            tracing::info!(url = %url, "using SQLite execution store");
            Ok(ConfiguredStore::Sqlite(SqliteExecutionStore::new(pool, policy)))
        }
    }
}

impl ExecutionStore for ConfiguredStore {
    async fn try_begin(&self, key: &str, operation: &str) -> Result<BeginOutcome, StoreError> {
        match self {
            ConfiguredStore::Memory(store) => store.try_begin(key, operation).await,
            ConfiguredStore::Sqlite(store) => store.try_begin(key, operation).await,
        }
    }

    async fn complete(&self, key: &str, payload: String) -> Result<ExecutionEntry, StoreError> {
        match self {
            ConfiguredStore::Memory(store) => store.complete(key, payload).await,
            ConfiguredStore::Sqlite(store) => store.complete(key, payload).await,
        }
    }

    async fn fail(&self, key: &str, message: String) -> Result<ExecutionEntry, StoreError> {
        match self {
            ConfiguredStore::Memory(store) => store.fail(key, message).await,
            ConfiguredStore::Sqlite(store) => store.fail(key, message).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<ExecutionEntry>, StoreError> {
        match self {
            ConfiguredStore::Memory(store) => store.get(key).await,
            ConfiguredStore::Sqlite(store) => store.get(key).await,
        }
    }

    async fn evict(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        match self {
            ConfiguredStore::Memory(store) => store.evict(now).await,
            ConfiguredStore::Sqlite(store) => store.evict(now).await,
        }
    }
}
