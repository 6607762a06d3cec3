//! Storage error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`BoxStore`](super::BoxStore).
///
/// Absence is never an error: missing rows surface as `false`, `None` or
/// [`ReparentOutcome::Missing`](super::ReparentOutcome::Missing).
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite rejected a statement or the connection failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database location could not be prepared.
    #[error("failed to prepare database path {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored row carries a kind tag this build does not know.
    #[error("unknown box kind: {0}")]
    InvalidKind(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
