//! Inputs a decision is made against (spec §4.4, §4.5 "available options").

use serde_json::{Map, Value};

/// One candidate course of action offered to the decision engine.
#[derive(Debug, Clone)]
pub struct AvailableOption {
    /// Kind of option, e.g. `"historical"`, `"learned"`, `"default"`.
    pub option_type: String,
    /// Option payload.
    pub data: Value,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Estimated quality of the outcome, `[0, 1]`.
    pub quality_score: f64,
    /// Estimated risk of the outcome, `[0, 1]`.
    pub risk_score: f64,
    /// Estimated resource efficiency, `[0, 1]`.
    pub efficiency_score: f64,
}

/// Everything `DecisionEngine::make_decision` needs to evaluate one action.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    /// The action type being decided on.
    pub action_type: String,
    /// Raw action input.
    pub input: Value,
    /// Candidate options surfaced by the caller (spec §4.5).
    pub available_options: Vec<AvailableOption>,
    /// Resource name -> amount required by this action.
    pub required_resources: Map<String, Value>,
    /// Estimated duration in seconds.
    pub estimated_duration: f64,
    /// Estimated quality score in `[0, 1]`.
    pub quality_score: f64,
    /// Tolerance the caller is willing to accept for risk, `[0, 1]`.
    pub risk_tolerance: f64,
    /// Value of the sticky field used for A/B bucketing (e.g. a submission id).
    pub sticky_value: Option<String>,
}

impl DecisionContext {
    /// A minimal context carrying only an action type and input, useful for
    /// callers that don't need resource/time/quality gating.
    #[must_use]
    pub fn new(action_type: impl Into<String>, input: Value) -> Self {
        Self {
            action_type: action_type.into(),
            input,
            available_options: Vec::new(),
            required_resources: Map::new(),
            estimated_duration: 0.0,
            quality_score: 1.0,
            risk_tolerance: 0.5,
            sticky_value: None,
        }
    }
}
