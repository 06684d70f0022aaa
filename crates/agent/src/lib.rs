#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! A stateful agent worker: task queue, decision loop, self-persistence
//! (spec §4.5).

pub mod agent;
pub mod analytics;
pub mod error;
pub mod process_task;
pub mod queue;
pub mod types;

pub use agent::Agent;
pub use analytics::{Insight, InsightSeverity, Recommendation, StrategicAnalysis};
pub use error::{AgentError, AgentResult};
pub use process_task::{EchoProcessor, ProcessTask};
pub use queue::TaskQueue;
pub use types::{
    Action, ActionResult, AgentAggregates, AgentHealth, AgentSnapshot, AgentState, AgentType,
    HealthStatus,
};
