//! Error type for the synchronizer (spec §7).

use thiserror::Error;

/// Errors surfaced by `Synchronizer`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Underlying storage failure.
    #[error(transparent)]
    Store(#[from] folio_store::StoreError),
    /// Another sync for the same `(entity_type, entity_id)` is already
    /// running, either in-process or under the distributed advisory lock.
    #[error("sync already in progress for '{0}'")]
    AlreadyInFlight(String),
    /// The distributed advisory lock `{0}` is held by another process.
    #[error("advisory lock '{0}' is held by another process")]
    Locked(String),
    /// Malformed entity payload or configuration.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Convenience alias.
pub type SyncResult<T> = Result<T, SyncError>;
