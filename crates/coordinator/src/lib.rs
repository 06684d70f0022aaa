#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Agent directory, fixed-DAG workflow execution, and trigger fan-out
//! (spec §4.6).

pub mod coordinator;
pub mod directory;
pub mod error;
pub mod types;
pub mod workflow;

pub use coordinator::Coordinator;
pub use directory::AgentDirectory;
pub use error::{CoordinatorError, CoordinatorResult};
pub use types::{AgentProfile, StepRecord, WorkflowKind, WorkflowResult, WorkflowStatus};
pub use workflow::StepSpec;
