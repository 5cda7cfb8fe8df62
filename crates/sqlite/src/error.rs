//! Error types for the SQLite backend.

/// Errors that can occur when working with the database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row holds a value this crate never writes
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
