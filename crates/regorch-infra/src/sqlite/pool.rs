//! SQLite connections for the execution store.
//!
//! The store needs `try_begin` to be linearizable per key. Mutations go
//! through a writer pool capped at one connection, reads fan out over a
//! read-only pool. Both run in WAL mode so readers never block the writer.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const READER_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DATABASE_FILE: &str = "executions.db";

/// Reader/writer pool pair over one SQLite database.
#[derive(Clone)]
pub struct DatabasePool {
    /// Read-only, up to eight connections.
    pub reader: SqlitePool,
    /// Exactly one connection; every write is serialized here.
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Connect the writer, apply pending migrations, then connect readers.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = connect_options(database_url)?;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(options.read_only(true))
            .await?;

        tracing::debug!(url = database_url, "opened execution database");
        Ok(Self { reader, writer })
    }

    pub async fn close(&self) {
        self.reader.close().await;
        self.writer.close().await;
    }
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT))
}

/// `sqlite://{data_dir}/executions.db?mode=rwc`
pub fn default_database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join(DATABASE_FILE).display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migration_creates_execution_table() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&default_database_url(dir.path())).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'workflow_executions'",
        )
        .fetch_one(&pool.reader)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn writer_runs_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&default_database_url(dir.path())).await.unwrap();

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert!(mode.eq_ignore_ascii_case("wal"));
    }

    #[tokio::test]
    async fn reader_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&default_database_url(dir.path())).await.unwrap();

        let result = sqlx::query("DELETE FROM workflow_executions")
            .execute(&pool.reader)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reopening_keeps_existing_schema() {
        let dir = tempfile::tempdir().unwrap();
        let url = default_database_url(dir.path());

        let first = DatabasePool::new(&url).await.unwrap();
        first.close().await;
        DatabasePool::new(&url).await.unwrap();
    }

    #[test]
    fn default_url_points_into_data_dir() {
        let url = default_database_url(Path::new("/var/lib/regorch"));
        assert_eq!(url, "sqlite:///var/lib/regorch/executions.db?mode=rwc");
    }
}
