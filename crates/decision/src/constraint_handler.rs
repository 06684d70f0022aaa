//! Constraint validation against a `DecisionContext` (spec §4.4 "ConstraintHandler").

use std::sync::Arc;

use chrono::Utc;
use folio_store::{new_id, Constraint, ConstraintKind, PersistentStore, Priority};

use crate::context::DecisionContext;
use crate::error::DecisionResult;

/// Adds and validates an agent's constraints.
#[derive(Clone)]
pub struct ConstraintHandler {
    store: Arc<PersistentStore>,
    agent_id: String,
}

impl ConstraintHandler {
    /// Scopes constraint handling to one agent.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>, agent_id: impl Into<String>) -> Self {
        Self { store, agent_id: agent_id.into() }
    }

    /// Adds a constraint, returning its id.
    #[allow(clippy::too_many_arguments)]
    pub async fn add(
        &self,
        kind: ConstraintKind,
        description: impl Into<String>,
        parameters: serde_json::Value,
        strict: bool,
        priority: Priority,
    ) -> DecisionResult<String> {
        let constraint = Constraint {
            id: new_id(),
            agent_id: self.agent_id.clone(),
            kind,
            description: description.into(),
            parameters,
            strict,
            priority,
            active: true,
            created_at: Utc::now(),
        };
        let stored = self.store.add_constraint(constraint).await?;
        Ok(stored.id)
    }

    /// Every constraint currently on file for this agent, active or not.
    pub async fn active(&self) -> DecisionResult<Vec<Constraint>> {
        Ok(self.store.list_constraints(&self.agent_id).await?)
    }

    /// Validates `context` against every active constraint.
    ///
    /// Returns `(proceed, violations)`: a strict violation sets `proceed=false`;
    /// a non-strict one only appends a message.
    pub async fn validate(&self, context: &DecisionContext) -> DecisionResult<(bool, Vec<String>)> {
        let constraints = self.store.list_constraints(&self.agent_id).await?;
        let mut proceed = true;
        let mut violations = Vec::new();
        for constraint in &constraints {
            if is_violated(constraint, context) {
                violations.push(format!("Constraint '{}' violated", constraint.description));
                if constraint.strict {
                    proceed = false;
                }
            }
        }
        Ok((proceed, violations))
    }
}

fn is_violated(constraint: &Constraint, context: &DecisionContext) -> bool {
    match constraint.kind {
        ConstraintKind::Resource => {
            let Some(resource) = constraint.parameters.get("resource").and_then(|v| v.as_str()) else {
                return false;
            };
            let Some(budget) = constraint.parameters.get("budget").and_then(serde_json::Value::as_f64) else {
                return false;
            };
            context
                .required_resources
                .get(resource)
                .and_then(serde_json::Value::as_f64)
                .is_some_and(|required| required > budget)
        }
        ConstraintKind::Time => constraint
            .parameters
            .get("max_duration")
            .and_then(serde_json::Value::as_f64)
            .is_some_and(|max| context.estimated_duration > max),
        ConstraintKind::Quality => constraint
            .parameters
            .get("min_quality")
            .and_then(serde_json::Value::as_f64)
            .is_some_and(|min| context.quality_score < min),
        ConstraintKind::Policy => constraint
            .parameters
            .get("forbidden_actions")
            .and_then(serde_json::Value::as_array)
            .is_some_and(|forbidden| {
                forbidden
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .any(|action| action == context.action_type)
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{Backend, NoopCache, StoreConfig};

    async fn handler() -> ConstraintHandler {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        ConstraintHandler::new(Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache))), "ag1")
    }

    fn context_with_cpu(cpu: f64) -> DecisionContext {
        let mut ctx = DecisionContext::new("run", serde_json::json!({}));
        ctx.required_resources.insert("cpu".into(), serde_json::json!(cpu));
        ctx
    }

    #[tokio::test]
    async fn strict_resource_violation_blocks_scenario_s1() {
        let handler = handler().await;
        handler
            .add(
                ConstraintKind::Resource,
                "Maximum CPU",
                serde_json::json!({"resource": "cpu", "budget": 0.5}),
                true,
                Priority::High,
            )
            .await
            .unwrap();
        let (proceed, violations) = handler.validate(&context_with_cpu(0.8)).await.unwrap();
        assert!(!proceed);
        assert_eq!(violations, vec!["Constraint 'Maximum CPU' violated"]);
    }

    #[tokio::test]
    async fn non_strict_violation_does_not_block() {
        let handler = handler().await;
        handler
            .add(
                ConstraintKind::Resource,
                "Preferred CPU",
                serde_json::json!({"resource": "cpu", "budget": 0.5}),
                false,
                Priority::Low,
            )
            .await
            .unwrap();
        let (proceed, violations) = handler.validate(&context_with_cpu(0.8)).await.unwrap();
        assert!(proceed);
        assert_eq!(violations.len(), 1);
    }
}
