//! Error type for the agent runtime (spec §7).

use thiserror::Error;

/// Errors surfaced by `Agent::execute` and its collaborators.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Underlying storage failure.
    #[error(transparent)]
    Store(#[from] folio_store::StoreError),
    /// Memory subsystem failure.
    #[error(transparent)]
    Memory(#[from] folio_memory::MemoryError),
    /// Learning subsystem failure.
    #[error(transparent)]
    Learning(#[from] folio_learning::LearningError),
    /// Decision subsystem failure.
    #[error(transparent)]
    Decision(#[from] folio_decision::DecisionError),
    /// Malformed input, e.g. an action with no `expected_output`.
    #[error("validation error: {0}")]
    Validation(String),
    /// The action exceeded its implicit deadline (`estimated_duration * 2`).
    #[error("action '{0}' timed out")]
    Timeout(String),
    /// `process_task` itself failed.
    #[error("task processing failed: {0}")]
    TaskFailed(String),
}

/// Convenience alias.
pub type AgentResult<T> = Result<T, AgentError>;
