//! The three fixed DAGs a `Coordinator` can run (spec §4.6).

use folio_agent::AgentType;
use serde_json::Value;

/// One statically-declared hop in a fixed workflow DAG.
pub struct StepSpec {
    /// The agent type that performs this step.
    pub agent_type: AgentType,
    /// The action name passed to the agent and checked against its triggers.
    pub action_type: &'static str,
    /// Whether this step should run, given the accumulated context of every
    /// prior step's output merged together. Steps gated off are omitted
    /// from `WorkflowResult::steps` entirely (spec §4.6).
    pub gate: fn(&serde_json::Map<String, Value>) -> bool,
}

fn always(_: &serde_json::Map<String, Value>) -> bool {
    true
}

fn quality_score_above_threshold(context: &serde_json::Map<String, Value>) -> bool {
    context.get("quality_score").and_then(Value::as_f64).map_or(true, |score| score > 0.6)
}

fn accepted(context: &serde_json::Map<String, Value>) -> bool {
    quality_score_above_threshold(context) && context.get("accept").and_then(Value::as_bool).unwrap_or(false)
}

fn approved(context: &serde_json::Map<String, Value>) -> bool {
    accepted(context) && context.get("approved").and_then(Value::as_bool).unwrap_or(false)
}

/// `manuscript_processing`: Submission assesses, Editorial decides, (if
/// accept) Review assigns reviewers, Quality validates, (if approved)
/// Production produces. Analytics always runs last.
#[must_use]
pub fn manuscript_processing() -> Vec<StepSpec> {
    vec![
        StepSpec { agent_type: AgentType::Submission, action_type: "assess_submission", gate: always },
        StepSpec { agent_type: AgentType::Editorial, action_type: "decide", gate: quality_score_above_threshold },
        StepSpec { agent_type: AgentType::Review, action_type: "assign_reviewers", gate: accepted },
        StepSpec { agent_type: AgentType::Quality, action_type: "validate", gate: accepted },
        StepSpec { agent_type: AgentType::Production, action_type: "produce", gate: approved },
        StepSpec { agent_type: AgentType::Analytics, action_type: "summarize", gate: always },
    ]
}

/// `research_discovery`: Research discovers, Research analyzes trends,
/// Analytics generates insights.
#[must_use]
pub fn research_discovery() -> Vec<StepSpec> {
    vec![
        StepSpec { agent_type: AgentType::Research, action_type: "discover", gate: always },
        StepSpec { agent_type: AgentType::Research, action_type: "analyze_trends", gate: always },
        StepSpec { agent_type: AgentType::Analytics, action_type: "generate_insights", gate: always },
    ]
}

/// `publication_production`: Production produces, Production distributes,
/// Analytics analyzes performance.
#[must_use]
pub fn publication_production() -> Vec<StepSpec> {
    vec![
        StepSpec { agent_type: AgentType::Production, action_type: "produce", gate: always },
        StepSpec { agent_type: AgentType::Production, action_type: "distribute", gate: always },
        StepSpec { agent_type: AgentType::Analytics, action_type: "analyze_performance", gate: always },
    ]
}
