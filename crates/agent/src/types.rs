//! Agent-scoped value types (spec §4.5, §9 "Dynamic enumerations").

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use folio_store::Priority;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The seven cooperating agent types named in spec §1/§4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Discovers and analyzes research trends.
    Research,
    /// Assesses incoming manuscript submissions.
    Submission,
    /// Decides accept/reject and assigns reviewers.
    Editorial,
    /// Performs peer review coordination.
    Review,
    /// Validates manuscript quality gates.
    Quality,
    /// Produces and distributes accepted manuscripts.
    Production,
    /// Generates analytics and performance insights.
    Analytics,
}

impl AgentType {
    /// Stable string form used in logs, workflow steps, and ids.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Submission => "submission",
            Self::Editorial => "editorial",
            Self::Review => "review",
            Self::Quality => "quality",
            Self::Production => "production",
            Self::Analytics => "analytics",
        }
    }
}

/// Observable agent lifecycle state (spec §4.5 "State machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Idle and accepting new actions.
    Active,
    /// Currently executing an action.
    Busy,
    /// The last action failed with an unhandled exception.
    Error,
    /// Optional resting state between tasks.
    Idle,
}

/// A unit of work submitted to `Agent::execute` (glossary "Action").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Action category, matched against historical experiences and constraints.
    pub action_type: String,
    /// Raw action input.
    pub input: Value,
    /// Per-key expected output used by the success comparison (step 5).
    pub expected_output: Option<Value>,
    /// Scheduling priority; also used as the started-memory importance.
    pub priority: Priority,
    /// Estimated duration in seconds; the implicit deadline is `2x` this.
    pub estimated_duration: f64,
    /// Workflow run this action belongs to, if any (SPEC_FULL §B
    /// correlation-id propagation). Tagged onto the resulting `Experience`.
    pub correlation_id: Option<String>,
}

/// The outcome of `Agent::execute` (spec §4.5 step 8).
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    /// Whether the action's output matched `expected_output`.
    pub success: bool,
    /// Raw output of `process_task`.
    pub result: Value,
    /// Confidence reported by the decision engine.
    pub decision_confidence: f64,
    /// Decision engine recommendations, surfaced as rationale.
    pub reasoning: Vec<String>,
    /// Arbitrary execution metrics (e.g. elapsed seconds).
    pub metrics: Value,
}

/// Persisted+in-memory agent aggregates (spec §4.5 "State machine").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAggregates {
    /// Current lifecycle state.
    pub state: AgentState,
    /// Action type currently executing, if any.
    pub current_task: Option<String>,
    /// Timestamp of the most recent state transition.
    pub last_activity: DateTime<Utc>,
    /// Total actions executed (success or failure).
    pub total_actions: u64,
    /// Running success rate in `[0, 1]`.
    pub success_rate: f64,
}

impl Default for AgentAggregates {
    fn default() -> Self {
        Self {
            state: AgentState::Active,
            current_task: None,
            last_activity: Utc::now(),
            total_actions: 0,
            success_rate: 0.0,
        }
    }
}

/// `{status, issues}` shape shared with `Synchronizer::health` (SPEC_FULL §B).
#[derive(Debug, Clone, Serialize)]
pub struct AgentHealth {
    /// Overall health bucket.
    pub status: HealthStatus,
    /// Human-readable issue descriptions, empty when healthy.
    pub issues: Vec<String>,
}

/// Health bucket shared across components (SPEC_FULL §B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No issues detected.
    Healthy,
    /// Operating, but a non-fatal issue was observed.
    Degraded,
    /// Not able to make progress.
    Unhealthy,
}

/// The durable snapshot written by `Agent::save` / read by `Agent::load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent identifier.
    pub id: String,
    /// Agent type tag.
    pub agent_type: AgentType,
    /// Declared capability set.
    pub capabilities: BTreeSet<String>,
    /// Lifecycle state and aggregates.
    pub aggregates: AgentAggregates,
    /// Tasks still pending.
    pub pending: Vec<folio_store::Task>,
    /// Tasks already completed.
    pub completed: Vec<folio_store::Task>,
    /// Exported learner state (spec §4.5 "save"/"load", "plus the learning state blob").
    pub learning_state: folio_learning::LearningSnapshot,
}
