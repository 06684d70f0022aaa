//! Error type for the memory facades. Thin wrapper over `folio_store::StoreError`.

use thiserror::Error;

/// Errors surfaced by the memory facades.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Underlying storage failure.
    #[error(transparent)]
    Store(#[from] folio_store::StoreError),
}

/// Convenience alias.
pub type MemoryResult<T> = Result<T, MemoryError>;
