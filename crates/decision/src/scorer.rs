//! Pluggable external scoring (spec §9 "Pluggable predictors").
//!
//! Concrete ML models are out of scope; this crate only defines the contract
//! and a registry that, absent any configured model, yields `None`.

use async_trait::async_trait;

use crate::config::DecisionModelConfig;
use crate::context::DecisionContext;
use crate::error::DecisionResult;

/// An external predictor scoring a decision context.
#[async_trait]
pub trait ModelScorer: Send + Sync {
    /// Produces a scalar score for `context`, or `None` if the model abstains.
    async fn score(&self, context: &DecisionContext) -> DecisionResult<Option<f64>>;

    /// The predictor's version identifier, surfaced on `Decision::model_version`.
    fn version(&self) -> Option<String> {
        None
    }
}

/// Loads a `ModelScorer` from [`DecisionModelConfig`].
///
/// No concrete predictor ships in the core; this always returns `None`. A
/// host process wires in a real implementation via `DecisionEngine`'s
/// dependency-injection constructor.
#[must_use]
pub fn load_scorer(_config: &DecisionModelConfig) -> Option<std::sync::Arc<dyn ModelScorer>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_scorer_without_a_model_is_none() {
        assert!(load_scorer(&DecisionModelConfig::default()).is_none());
    }
}
