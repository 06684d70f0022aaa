//! Error type for the learning framework.

use thiserror::Error;

/// Errors surfaced by `LearningFramework`.
#[derive(Debug, Error)]
pub enum LearningError {
    /// Failure persisting or reading the underlying experience log.
    #[error(transparent)]
    Memory(#[from] folio_memory::MemoryError),
}

/// Convenience alias.
pub type LearningResult<T> = Result<T, LearningError>;
