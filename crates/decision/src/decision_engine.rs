//! Ties goals, constraints, risk, and planning into one proceed/halt call
//! (spec §4.4 "DecisionEngine").

use std::sync::Arc;

use folio_store::{Environment, PersistentStore};

use crate::config::{AbConfig, DecisionModelConfig};
use crate::constraint_handler::ConstraintHandler;
use crate::context::DecisionContext;
use crate::error::{DecisionError, DecisionResult};
use crate::goal_manager::GoalManager;
use crate::planner::AdaptivePlanner;
use crate::risk_assessor::{RiskAssessment, RiskAssessor};
use crate::scorer::ModelScorer;

/// Outcome of `DecisionEngine::make_decision`.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the action may proceed.
    pub can_proceed: bool,
    /// Confidence in `[0.1, 0.95]`.
    pub confidence: f64,
    /// External predictor score, if one was invoked and responded.
    pub score: Option<f64>,
    /// Constraint violation messages (strict and non-strict).
    pub violations: Vec<String>,
    /// Aggregate risk assessment.
    pub risk: RiskAssessment,
    /// Id of the plan generated for the highest-priority active goal, if any.
    pub plan: Option<String>,
    /// A/B bucket assigned to this decision.
    pub variant: String,
    /// The predictor's version, if one was invoked.
    pub model_version: Option<String>,
    /// Prose recommendations derived from proceed/violations/risk.
    pub recommendations: Vec<String>,
}

/// Produces a proceed/halt decision for one agent.
pub struct DecisionEngine {
    goals: GoalManager,
    constraints: ConstraintHandler,
    risks: RiskAssessor,
    planner: AdaptivePlanner,
    scorer: Option<Arc<dyn ModelScorer>>,
    ab_config: AbConfig,
    environment: Environment,
}

impl DecisionEngine {
    /// Builds the four sub-managers for `agent_id` over `store`.
    #[must_use]
    pub fn for_agent(store: Arc<PersistentStore>, agent_id: impl Into<String>, environment: Environment) -> Self {
        let agent_id = agent_id.into();
        Self::with_managers(
            GoalManager::new(Arc::clone(&store), agent_id.clone()),
            ConstraintHandler::new(Arc::clone(&store), agent_id.clone()),
            RiskAssessor::new(Arc::clone(&store), agent_id),
            AdaptivePlanner::new(store),
            crate::scorer::load_scorer(&DecisionModelConfig::from_env()),
            AbConfig::default(),
            environment,
        )
    }

    /// Dependency-injection constructor: accepts the four sub-managers directly.
    /// Behaves identically to [`Self::for_agent`] given equivalent managers.
    #[must_use]
    pub fn with_managers(
        goals: GoalManager,
        constraints: ConstraintHandler,
        risks: RiskAssessor,
        planner: AdaptivePlanner,
        scorer: Option<Arc<dyn ModelScorer>>,
        ab_config: AbConfig,
        environment: Environment,
    ) -> Self {
        Self { goals, constraints, risks, planner, scorer, ab_config, environment }
    }

    /// Runs the eight-step decision algorithm of spec §4.4.
    pub async fn make_decision(&self, context: &DecisionContext) -> DecisionResult<Decision> {
        let active = self.goals.list_active().await?;
        let (can_proceed, violations) = self.constraints.validate(context).await?;
        let risk = self.risks.assess(context).await?;

        let plan = if can_proceed {
            if let Some(top_goal) = active.first() {
                let constraints_for_plan = self.constraints.active().await?;
                Some(self.planner.create(top_goal, &constraints_for_plan, &risk).await?)
            } else {
                None
            }
        } else {
            None
        };

        let (score, model_version) = match &self.scorer {
            Some(scorer) => match scorer.score(context).await {
                Ok(score) => (score, scorer.version()),
                Err(err) => {
                    if self.environment == Environment::Production {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, "model scorer failed outside production; proceeding without a score");
                    (None, None)
                }
            },
            None => {
                if self.environment == Environment::Production {
                    return Err(DecisionError::Configuration(
                        "no predictor configured while ENVIRONMENT=production".to_string(),
                    ));
                }
                (None, None)
            }
        };

        let variant = self.ab_config.choose_variant(context.sticky_value.as_deref());

        let base = if can_proceed { 0.8 } else { 0.2 };
        let confidence = (base - 0.3 * risk.overall_score - 0.1 * violations.len() as f64).clamp(0.1, 0.95);

        let recommendations = build_recommendations(can_proceed, &violations, &risk);

        Ok(Decision {
            can_proceed,
            confidence,
            score,
            violations,
            risk,
            plan,
            variant,
            model_version,
            recommendations,
        })
    }
}

fn build_recommendations(can_proceed: bool, violations: &[String], risk: &RiskAssessment) -> Vec<String> {
    let mut recommendations = Vec::new();
    if !can_proceed {
        recommendations.push("Address constraint violations before proceeding.".to_string());
    }
    if risk.level >= folio_store::RiskLevel::High {
        recommendations.push("Apply risk mitigations before proceeding.".to_string());
    }
    if can_proceed && !violations.is_empty() {
        recommendations.push("Review non-blocking violations once proceeding.".to_string());
    }
    if can_proceed && violations.is_empty() && risk.level < folio_store::RiskLevel::Medium {
        recommendations.push("Proceed as planned.".to_string());
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint_handler::ConstraintHandler;
    use crate::goal_manager::GoalManager;
    use crate::risk_assessor::RiskAssessor;
    use folio_store::{Backend, ConstraintKind, NoopCache, Priority, StoreConfig};

    async fn engine() -> DecisionEngine {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        let store = Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache)));
        DecisionEngine::for_agent(store, "ag1", Environment::Development)
    }

    #[tokio::test]
    async fn scenario_s1_constraint_block() {
        let engine = engine().await;
        engine.goals.create("process submission", serde_json::json!({}), Priority::High, None).await.unwrap();
        engine
            .constraints
            .add(ConstraintKind::Resource, "Maximum CPU", serde_json::json!({"resource": "cpu", "budget": 0.5}), true, Priority::High)
            .await
            .unwrap();
        engine.risks.add("operational", "slip", 0.3, 0.5, vec![], vec![]).await.unwrap();

        let mut ctx = DecisionContext::new("run", serde_json::json!({}));
        ctx.required_resources.insert("cpu".into(), serde_json::json!(0.8));
        ctx.estimated_duration = 60.0;
        ctx.quality_score = 0.9;

        let decision = engine.make_decision(&ctx).await.unwrap();
        assert!(!decision.can_proceed);
        assert_eq!(decision.violations, vec!["Constraint 'Maximum CPU' violated"]);
        assert!((decision.risk.overall_score - 0.15).abs() < 1e-9);
        assert!(decision.plan.is_none());
        assert!((decision.confidence - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn proceeding_decision_creates_a_plan_for_top_goal() {
        let engine = engine().await;
        engine.goals.create("review manuscript", serde_json::json!({}), Priority::Critical, None).await.unwrap();
        let ctx = DecisionContext::new("run", serde_json::json!({}));
        let decision = engine.make_decision(&ctx).await.unwrap();
        assert!(decision.can_proceed);
        assert!(decision.plan.is_some());
    }
}
