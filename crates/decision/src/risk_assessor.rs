//! Aggregate risk scoring over an agent's risk factors (spec §4.4 "RiskAssessor").

use std::sync::Arc;

use chrono::Utc;
use folio_store::{new_id, PersistentStore, RiskFactor, RiskLevel};

use crate::context::DecisionContext;
use crate::error::DecisionResult;

/// Result of `RiskAssessor::assess`.
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    /// Mean of per-factor `probability * impact`, clipped to 1.
    pub overall_score: f64,
    /// Bucket derived from `overall_score`.
    pub level: RiskLevel,
    /// Factors whose individual score exceeds 0.3.
    pub active_risks: Vec<RiskFactor>,
    /// Number of risk factors considered.
    pub count: usize,
    /// Prose recommendation derived from `level`/`overall_score`.
    pub recommendation: String,
}

/// Adds risk factors and assesses their aggregate severity.
#[derive(Clone)]
pub struct RiskAssessor {
    store: Arc<PersistentStore>,
    agent_id: String,
}

impl RiskAssessor {
    /// Scopes risk assessment to one agent.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>, agent_id: impl Into<String>) -> Self {
        Self { store, agent_id: agent_id.into() }
    }

    /// Adds a risk factor, returning its id.
    #[allow(clippy::too_many_arguments)]
    pub async fn add(
        &self,
        kind: impl Into<String>,
        description: impl Into<String>,
        probability: f64,
        impact: f64,
        mitigations: Vec<String>,
        monitors: Vec<String>,
    ) -> DecisionResult<String> {
        let mut risk = RiskFactor {
            id: new_id(),
            agent_id: self.agent_id.clone(),
            kind: kind.into(),
            description: description.into(),
            probability: probability.clamp(0.0, 1.0),
            impact: impact.clamp(0.0, 1.0),
            level: RiskLevel::Minimal,
            mitigations,
            monitors,
            created_at: Utc::now(),
        };
        risk.recompute_level();
        let stored = self.store.add_risk(risk).await?;
        Ok(stored.id)
    }

    /// Assesses the agent's current risk factors. `context` is accepted for
    /// interface symmetry with `DecisionEngine::make_decision`; assessment
    /// today depends only on the stored factors.
    pub async fn assess(&self, _context: &DecisionContext) -> DecisionResult<RiskAssessment> {
        let risks = self.store.list_risks(&self.agent_id).await?;
        let count = risks.len();
        let overall_score = if count == 0 {
            0.0
        } else {
            (risks.iter().map(|r| r.probability * r.impact).sum::<f64>() / count as f64).min(1.0)
        };
        let level = RiskLevel::from_score(overall_score);
        let active_risks: Vec<RiskFactor> = risks.into_iter().filter(|r| r.probability * r.impact > 0.3).collect();
        let recommendation = recommend_for(level, overall_score);
        Ok(RiskAssessment { overall_score, level, active_risks, count, recommendation })
    }
}

fn recommend_for(level: RiskLevel, score: f64) -> String {
    match level {
        RiskLevel::Critical => "Halt and escalate: risk exposure is critical.".to_string(),
        RiskLevel::High => "Apply mitigations before proceeding; risk exposure is high.".to_string(),
        RiskLevel::Medium => "Proceed with monitoring; risk exposure is moderate.".to_string(),
        RiskLevel::Low => "Proceed; risk exposure is low.".to_string(),
        RiskLevel::Minimal => format!("Proceed; risk exposure is minimal (score {score:.2})."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{Backend, NoopCache, StoreConfig};

    async fn assessor() -> RiskAssessor {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        RiskAssessor::new(Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache))), "ag1")
    }

    #[tokio::test]
    async fn single_risk_matches_scenario_s1() {
        let assessor = assessor().await;
        assessor.add("operational", "delay risk", 0.3, 0.5, vec![], vec![]).await.unwrap();
        let ctx = DecisionContext::new("run", serde_json::json!({}));
        let assessment = assessor.assess(&ctx).await.unwrap();
        assert!((assessment.overall_score - 0.15).abs() < 1e-9);
        assert_eq!(assessment.level, RiskLevel::Minimal);
    }

    #[tokio::test]
    async fn no_risks_yields_minimal() {
        let assessor = assessor().await;
        let ctx = DecisionContext::new("run", serde_json::json!({}));
        let assessment = assessor.assess(&ctx).await.unwrap();
        assert_eq!(assessment.overall_score, 0.0);
        assert_eq!(assessment.level, RiskLevel::Minimal);
        assert!(assessment.active_risks.is_empty());
    }
}
