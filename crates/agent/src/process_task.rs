//! The subclass-provided execution hook (spec §4.5 step 4).

use async_trait::async_trait;
use folio_decision::Decision;
use serde_json::Value;

use crate::error::AgentResult;

/// Domain-specific action execution, injected per agent type.
///
/// The uniform lifecycle in `Agent::execute` is part of the core; what a
/// `process_task` implementation actually does with `data` is deliberately
/// out of scope (spec §1: "the per-domain heuristics inside...are not").
#[async_trait]
pub trait ProcessTask: Send + Sync {
    /// Executes the decided option against `data`, returning a raw output value.
    async fn process(&self, data: &Value, decision: &Decision) -> AgentResult<Value>;
}

/// A `ProcessTask` that echoes its input back as the output. Useful for tests
/// and as a placeholder until a host process wires in real domain logic.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoProcessor;

#[async_trait]
impl ProcessTask for EchoProcessor {
    async fn process(&self, data: &Value, _decision: &Decision) -> AgentResult<Value> {
        Ok(data.clone())
    }
}
