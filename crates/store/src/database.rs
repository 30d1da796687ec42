//! SQLite connection pool and shared query helpers.

use std::path::Path;

use common::acl::AceFilter;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::Result;

/// SQLite-backed group store and device ACL service.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database file and bring its schema up to date.
    pub async fn new(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(store)
    }

    /// Create an in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        // every connection would get its own in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// ` WHERE a = ? AND b = ?` for every condition set on the filter, and the
/// values to bind in order. Empty when the filter matches everything.
pub(crate) fn where_clause(filter: &AceFilter) -> (String, Vec<&str>) {
    let conditions = filter.conditions();
    if conditions.is_empty() {
        return (String::new(), Vec::new());
    }

    let clause = conditions
        .iter()
        .map(|(field, _)| format!("{} = ?", field))
        .collect::<Vec<_>>()
        .join(" AND ");
    let values = conditions.into_iter().map(|(_, value)| value).collect();
    (format!(" WHERE {}", clause), values)
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
