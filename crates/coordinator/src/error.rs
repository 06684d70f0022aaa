//! Error type for workflow execution (spec §7).

use thiserror::Error;

/// Errors surfaced by `Coordinator::run_workflow`.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// An agent-level failure during a step.
    #[error(transparent)]
    Agent(#[from] folio_agent::AgentError),
    /// The requested workflow step named an agent type the directory doesn't own.
    #[error("no agent of type '{0}' in the directory")]
    MissingAgent(String),
}

/// Convenience alias.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
