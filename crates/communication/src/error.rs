//! Error type for the communication dispatcher (spec §7).

use thiserror::Error;

/// Errors surfaced by `CommunicationDispatcher`.
#[derive(Debug, Error)]
pub enum CommError {
    /// Referenced an unknown template or escalation rule.
    #[error("validation error: {0}")]
    Validation(String),
    /// Attempted silent delivery in production mode, or a channel provider
    /// is not configured for a production deployment.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The channel provider rejected or failed to deliver the message.
    #[error("channel delivery error: {0}")]
    Channel(String),
}

/// Convenience alias.
pub type CommResult<T> = Result<T, CommError>;
