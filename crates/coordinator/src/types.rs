//! Workflow-scoped value types (spec §4.6).

use std::collections::BTreeSet;

use folio_agent::AgentType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the three fixed DAGs a `Coordinator` can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Submission assesses, Editorial decides, Review/Quality/Production gate
    /// on acceptance, Analytics runs last.
    ManuscriptProcessing,
    /// Research discovers and analyzes trends, Analytics generates insights.
    ResearchDiscovery,
    /// Production produces and distributes, Analytics analyzes performance.
    PublicationProduction,
}

impl WorkflowKind {
    /// Stable string form used in logs and event payloads.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ManuscriptProcessing => "manuscript_processing",
            Self::ResearchDiscovery => "research_discovery",
            Self::PublicationProduction => "publication_production",
        }
    }
}

/// Outcome of one executed workflow step, recorded in execution order.
/// Skipped steps (spec §4.6 "conditional gate") are never appended here.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Which agent type ran this step.
    pub agent_type: AgentType,
    /// The action it performed.
    pub action_type: String,
    /// Whether the step's own outcome was a success.
    pub success: bool,
    /// Wall-clock seconds spent on this step.
    pub execution_time: f64,
    /// The step's output, present when `success` and no hard error occurred.
    pub result: Option<Value>,
    /// A hard error message, present when the agent action itself failed
    /// (as opposed to a business-level `success: false`).
    pub error: Option<String>,
}

/// Terminal state of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every executed step ran without a hard error (business failures and
    /// gate-skips do not count against this).
    Completed,
    /// At least one step raised a hard error.
    Failed,
}

/// The result of one `Coordinator::run_workflow` call.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    /// Minted once per run and threaded through every action/experience
    /// produced while executing it.
    pub correlation_id: String,
    /// Which DAG ran.
    pub kind: WorkflowKind,
    /// Terminal status.
    pub status: WorkflowStatus,
    /// Executed steps, in order; skipped steps are omitted entirely.
    pub steps: Vec<StepRecord>,
    /// Sum of every executed step's `execution_time`.
    pub execution_time: f64,
}

/// An agent type's declared event-routing configuration (spec §4.6
/// "triggers, notifications, escalations, and data_sharing").
#[derive(Debug, Clone, Default)]
pub struct AgentProfile {
    /// Action names that, when completed by this agent, fan out an event.
    /// The bool marks whether the trigger is "critical" (also notifies
    /// `escalations`, not just `notifications`).
    pub triggers: std::collections::BTreeMap<String, bool>,
    /// Agent types notified (best-effort) when a trigger fires.
    pub notifications: BTreeSet<AgentType>,
    /// Agent types additionally notified when a *critical* trigger fires.
    pub escalations: BTreeSet<AgentType>,
    /// Agent types this agent is willing to share memory/context with.
    /// Declarative only; `folio-coordinator` does not enforce it today.
    pub data_sharing: BTreeSet<AgentType>,
}
