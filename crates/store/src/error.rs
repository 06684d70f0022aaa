//! Error categories for the store (spec §7).

use thiserror::Error;

/// Errors surfaced by `PersistentStore` and its callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed input; never retried.
    #[error("validation error: {0}")]
    Validation(String),
    /// Transient connection/lock contention; caller may retry.
    #[error("transient store error: {0}")]
    Transient(String),
    /// Required external dependency absent in production mode.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Schema corruption or unrecoverable engine error; fatal.
    #[error("fatal store error: {0}")]
    Fatal(String),
    /// Entity not found where one was required.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// True if the caller may reasonably retry the operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Transient(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.message().contains("locked") => {
                Self::Transient(err.to_string())
            }
            _ => Self::Fatal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Convenience alias.
pub type StoreResult<T> = Result<T, StoreError>;
