//! SQLite connection pool and schema.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::error::{DatabaseError, Result};

/// SQLite database connection pool.
///
/// Cheap to clone; clones share the pool. The tree backend, grant
///  registry and restriction store can all run off the same database.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
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

        tracing::info!(path = %path.display(), "opened collection database");
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Create an in-memory database.
    ///
    /// Every connection to `:memory:` is its own database, so the pool is
    ///  capped at a single connection and callers must not hold a snapshot
    ///  while they wait on a commit. That connection is never retired: the
    ///  database goes with it.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::debug!("collection database migrations applied");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Parse a UUID column.
pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| DatabaseError::CorruptRow(format!("{} {:?}: {}", column, value, e)))
}

/// Push `ids` as a bound list and close the parenthesis.
pub(crate) fn push_ids<T: ToString>(builder: &mut QueryBuilder<'_, Sqlite>, ids: &[T]) {
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(")");
}
