//! Adaptive plan generation and feedback-driven revision (spec §4.4 "AdaptivePlanner").

use std::sync::Arc;

use chrono::Utc;
use folio_store::{new_id, Constraint, Goal, Plan, PlanStatus, PlanStep, PersistentStore, Priority};

use crate::error::DecisionResult;
use crate::risk_assessor::RiskAssessment;

/// Feedback used to adapt an existing plan.
#[derive(Debug, Clone, Default)]
pub struct PlanFeedback {
    /// Actual duration divided by estimated duration.
    pub time_ratio: Option<f64>,
    /// Fraction of allotted resource actually used.
    pub resource_utilization: Option<f64>,
    /// Observed quality of the outcome.
    pub quality_score: Option<f64>,
}

/// Generates and revises plans.
#[derive(Clone)]
pub struct AdaptivePlanner {
    store: Arc<PersistentStore>,
}

impl AdaptivePlanner {
    /// Wraps a store handle.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Builds and persists a plan for `goal`, penalized by `constraints` and `risk`.
    pub async fn create(&self, goal: &Goal, constraints: &[Constraint], risk: &RiskAssessment) -> DecisionResult<String> {
        let description_lower = goal.description.to_lowercase();
        let mut steps = vec![analysis_step()];
        if description_lower.contains("research") {
            steps.push(stage_step(2, "Research stage", "research", 20.0));
        } else if description_lower.contains("review") {
            steps.push(stage_step(2, "Review stage", "review", 15.0));
        } else {
            steps.push(stage_step(2, "Execution stage", "execute", 25.0));
        }
        steps.push(validation_step(steps.len() as u32 + 1));

        let duration_est = steps.iter().map(|s| s.duration_est).sum();
        let resource_requirements = max_resources(&steps);

        let critical_indicator = goal.priority == Priority::Critical;
        let strict_constraints = constraints.iter().filter(|c| c.strict).count();
        let mut success_probability = 0.8
            - if critical_indicator { 0.1 } else { 0.0 }
            - 0.05 * strict_constraints as f64
            - 0.3 * risk.overall_score;
        success_probability = success_probability.clamp(0.0, 1.0);

        let mut contingencies: Vec<String> = risk
            .active_risks
            .iter()
            .filter(|r| r.level >= folio_store::RiskLevel::High)
            .map(|r| format!("Contingency for high risk: {}", r.description))
            .collect();
        contingencies.push("Escalate to human reviewer if the plan fails.".to_string());

        let now = Utc::now();
        let plan = Plan {
            id: new_id(),
            agent_id: goal.agent_id.clone(),
            goal_id: goal.id.clone(),
            description: format!("Plan for: {}", goal.description),
            steps,
            duration_est,
            resource_requirements,
            success_probability,
            contingencies,
            status: PlanStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.create_plan(plan).await?;
        Ok(stored.id)
    }

    /// Adapts a persisted plan per `feedback`. Returns whether anything changed.
    pub async fn adapt(&self, plan_id: &str, feedback: &PlanFeedback) -> DecisionResult<bool> {
        let Some(mut plan) = self.store.get_plan(plan_id).await? else {
            return Ok(false);
        };
        let mut changed = false;

        if feedback.time_ratio.is_some_and(|ratio| ratio > 1.2) {
            for step in &mut plan.steps {
                step.duration_est *= 1.3;
            }
            plan.duration_est = plan.steps.iter().map(|s| s.duration_est).sum();
            changed = true;
        }

        if feedback.resource_utilization.is_some_and(|util| util > 0.9) {
            plan.contingencies.push("Resource capacity increase needed.".to_string());
            changed = true;
        }

        if feedback.quality_score.is_some_and(|score| score < 0.6) {
            let number = plan.steps.len() as u32 + 1;
            plan.steps.push(PlanStep {
                number,
                description: "Quality check".to_string(),
                action_type: "quality_check".to_string(),
                duration_est: 10.0,
                required_resources: serde_json::Map::new(),
                success_criteria: vec!["Quality score >= 0.8".to_string()],
                risk_factors: Vec::new(),
            });
            plan.duration_est += 10.0;
            changed = true;
        }

        if changed {
            plan.updated_at = Utc::now();
            self.store.update_plan(&plan).await?;
        }
        Ok(changed)
    }
}

fn analysis_step() -> PlanStep {
    PlanStep {
        number: 1,
        description: "Analysis".to_string(),
        action_type: "analysis".to_string(),
        duration_est: 10.0,
        required_resources: serde_json::Map::from_iter([("cpu".to_string(), serde_json::json!(0.1))]),
        success_criteria: vec!["Inputs understood".to_string()],
        risk_factors: Vec::new(),
    }
}

fn stage_step(number: u32, description: &str, action_type: &str, duration_est: f64) -> PlanStep {
    PlanStep {
        number,
        description: description.to_string(),
        action_type: action_type.to_string(),
        duration_est,
        required_resources: serde_json::Map::from_iter([("cpu".to_string(), serde_json::json!(0.3))]),
        success_criteria: vec!["Stage objective met".to_string()],
        risk_factors: Vec::new(),
    }
}

fn validation_step(number: u32) -> PlanStep {
    PlanStep {
        number,
        description: "Validation".to_string(),
        action_type: "validation".to_string(),
        duration_est: 5.0,
        required_resources: serde_json::Map::from_iter([("cpu".to_string(), serde_json::json!(0.1))]),
        success_criteria: vec!["Output passes validation".to_string()],
        risk_factors: Vec::new(),
    }
}

fn max_resources(steps: &[PlanStep]) -> serde_json::Map<String, serde_json::Value> {
    let mut max_map: serde_json::Map<String, serde_json::Value> = serde_json::Map::new();
    for step in steps {
        for (resource, amount) in &step.required_resources {
            let amount = amount.as_f64().unwrap_or(0.0);
            let current = max_map.get(resource).and_then(serde_json::Value::as_f64).unwrap_or(0.0);
            if amount > current {
                max_map.insert(resource.clone(), serde_json::json!(amount));
            }
        }
    }
    max_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk_assessor::RiskAssessment;
    use folio_store::{Backend, GoalStatus, NoopCache, RiskLevel, StoreConfig};

    async fn planner() -> AdaptivePlanner {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        AdaptivePlanner::new(Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache))))
    }

    fn sample_goal() -> Goal {
        let now = Utc::now();
        Goal {
            id: "g1".to_string(),
            agent_id: "ag1".to_string(),
            description: "research new trends".to_string(),
            priority: Priority::High,
            target_metrics: serde_json::json!({}),
            deadline: None,
            status: GoalStatus::Active,
            progress: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    fn empty_risk() -> RiskAssessment {
        RiskAssessment {
            overall_score: 0.0,
            level: RiskLevel::Minimal,
            active_risks: Vec::new(),
            count: 0,
            recommendation: String::new(),
        }
    }

    #[tokio::test]
    async fn research_keyword_selects_research_stage() {
        let planner = planner().await;
        let id = planner.create(&sample_goal(), &[], &empty_risk()).await.unwrap();
        let plan = planner.store.get_plan(&id).await.unwrap().unwrap();
        assert!(plan.steps.iter().any(|s| s.action_type == "research"));
    }

    #[tokio::test]
    async fn adapt_on_time_overrun_strictly_increases_durations_law_l4() {
        let planner = planner().await;
        let id = planner.create(&sample_goal(), &[], &empty_risk()).await.unwrap();
        let before = planner.store.get_plan(&id).await.unwrap().unwrap();
        let changed = planner
            .adapt(&id, &PlanFeedback { time_ratio: Some(1.5), ..Default::default() })
            .await
            .unwrap();
        assert!(changed);
        let after = planner.store.get_plan(&id).await.unwrap().unwrap();
        for (b, a) in before.steps.iter().zip(after.steps.iter()) {
            assert!(a.duration_est > b.duration_est);
        }
        assert!(after.duration_est >= before.duration_est);
    }

    #[tokio::test]
    async fn adapt_with_no_triggered_feedback_is_a_no_op() {
        let planner = planner().await;
        let id = planner.create(&sample_goal(), &[], &empty_risk()).await.unwrap();
        let changed = planner.adapt(&id, &PlanFeedback::default()).await.unwrap();
        assert!(!changed);
    }
}
