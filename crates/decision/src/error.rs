//! Error type for the decision subsystem (spec §7).

use thiserror::Error;

/// Errors surfaced by `DecisionEngine` and its sub-managers.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Underlying storage failure.
    #[error(transparent)]
    Store(#[from] folio_store::StoreError),
    /// Malformed input, e.g. an out-of-range probability.
    #[error("validation error: {0}")]
    Validation(String),
    /// A required predictor/provider is absent in production mode.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Convenience alias.
pub type DecisionResult<T> = Result<T, DecisionError>;
