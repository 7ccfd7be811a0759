//! Error types for cache backends.

use thiserror::Error;

/// Errors raised by a [`Cache`](super::Cache) backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The SQLite backend failed.
    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other backend failure.
    #[error("cache backend error: {0}")]
    Backend(String),
}
