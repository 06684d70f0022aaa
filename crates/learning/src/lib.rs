#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Four learners over agent experience, unified behind one façade
//! (spec §4.3).

pub mod error;
pub mod meta;
pub mod reinforcement;
pub mod supervised;
pub mod unsupervised;

pub use error::{LearningError, LearningResult};
pub use meta::{MetaLearner, Strategy};
pub use reinforcement::{ReinforcementLearner, ReinforcementParams};
pub use supervised::{similarity, SimilarHit, SupervisedExample, SupervisedLearner};
pub use unsupervised::{composite_key, Anomaly, Pattern, UnsupervisedLearner};

use std::collections::{HashMap, VecDeque};

use folio_memory::ExperienceDb;
use serde::{Deserialize, Serialize};

/// A point-in-time export of every learner's internal state, for self-persistence
/// (spec §4.5 "save"/"load", "plus the learning state blob").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningSnapshot {
    /// `ReinforcementLearner`'s Q-table.
    pub reinforcement_table: HashMap<String, HashMap<String, f64>>,
    /// `ReinforcementLearner`'s hyperparameters.
    pub reinforcement_params: Option<ReinforcementParams>,
    /// `SupervisedLearner`'s per-action-type example windows.
    pub supervised_examples: HashMap<String, VecDeque<SupervisedExample>>,
    /// `UnsupervisedLearner`'s clusters.
    pub unsupervised_clusters: HashMap<String, Vec<serde_json::Value>>,
    /// `MetaLearner`'s rolling outcome window.
    pub meta_window: VecDeque<bool>,
}

/// A recommendation emitted by `LearningFramework::recommend`.
#[derive(Debug, Clone)]
pub struct Recommendation {
    /// Kind of recommendation, e.g. `"historical_success"`, `"meta_strategy"`.
    pub rec_type: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Suggested action payload.
    pub action: serde_json::Value,
    /// Human-readable justification.
    pub reasoning: String,
}

/// Persists experiences and keeps all four learners in sync.
pub struct LearningFramework {
    experiences: ExperienceDb,
    /// Tabular Q-learner.
    pub reinforcement: ReinforcementLearner,
    /// Bounded labeled-example store.
    pub supervised: SupervisedLearner,
    /// Composite-key clustering.
    pub unsupervised: UnsupervisedLearner,
    /// Rolling performance window.
    pub meta: MetaLearner,
}

impl LearningFramework {
    /// Builds a framework backed by `experiences` with default learner hyperparameters.
    #[must_use]
    pub fn new(experiences: ExperienceDb) -> Self {
        Self {
            experiences,
            reinforcement: ReinforcementLearner::default(),
            supervised: SupervisedLearner::new(),
            unsupervised: UnsupervisedLearner::new(),
            meta: MetaLearner::new(),
        }
    }

    /// Persists one experience and updates every learner. The caller sees
    /// either the fully-updated state or a propagated storage error; no
    /// learner is updated before the experience itself is durably recorded.
    #[allow(clippy::too_many_arguments)]
    pub async fn learn(
        &self,
        agent_id: &str,
        action_type: &str,
        input: serde_json::Value,
        output: serde_json::Value,
        success: bool,
        metrics: serde_json::Value,
        correlation_id: Option<String>,
    ) -> LearningResult<String> {
        let id = self
            .experiences
            .log(agent_id, action_type, input.clone(), output.clone(), success, metrics, correlation_id)
            .await?;

        let reward = if success { 1.0 } else { -1.0 };
        let state = ReinforcementLearner::derive_state(&input);
        let next_state = ReinforcementLearner::derive_state(&output);
        self.reinforcement.update(&state, action_type, reward, &next_state);

        self.supervised.record(action_type, input.clone(), output, success);
        self.unsupervised.add(input);
        self.meta.record(success);

        if let Some(strategy) = self.meta.strategy() {
            self.reinforcement.set_params(ReinforcementParams {
                alpha: strategy.alpha,
                gamma: self.reinforcement.params().gamma,
                epsilon: strategy.epsilon,
            });
        }

        Ok(id)
    }

    /// Merges supervised-similar hits (successful ones only) with the current
    /// meta-learning strategy suggestion. Never panics on an empty history.
    #[must_use]
    pub fn recommend(&self, context: &serde_json::Value) -> Vec<Recommendation> {
        let mut out = Vec::new();
        if let Some(action_type) = context.get("action_type").and_then(|v| v.as_str()) {
            let input = context.get("input").cloned().unwrap_or(serde_json::Value::Null);
            for hit in self.supervised.find_similar(&input, action_type, 0.5) {
                if !hit.success {
                    continue;
                }
                out.push(Recommendation {
                    rec_type: "historical_success".to_string(),
                    confidence: hit.similarity,
                    action: hit.output,
                    reasoning: format!("a similar past '{action_type}' action succeeded"),
                });
            }
        }
        if let Some(strategy) = self.meta.strategy() {
            out.push(Recommendation {
                rec_type: "meta_strategy".to_string(),
                confidence: 0.5,
                action: serde_json::json!({"alpha": strategy.alpha, "epsilon": strategy.epsilon}),
                reasoning: "adjusted exploration/learning rate from recent performance".to_string(),
            });
        }
        out
    }

    /// Captures every learner's state for `Agent::save`.
    #[must_use]
    pub fn snapshot(&self) -> LearningSnapshot {
        let (reinforcement_table, reinforcement_params) = self.reinforcement.export();
        LearningSnapshot {
            reinforcement_table,
            reinforcement_params: Some(reinforcement_params),
            supervised_examples: self.supervised.export(),
            unsupervised_clusters: self.unsupervised.export(),
            meta_window: self.meta.export(),
        }
    }

    /// Restores every learner's state from `Agent::load`.
    pub fn restore(&self, snapshot: LearningSnapshot) {
        self.reinforcement.import(
            snapshot.reinforcement_table,
            snapshot.reinforcement_params.unwrap_or_default(),
        );
        self.supervised.import(snapshot.supervised_examples);
        self.unsupervised.import(snapshot.unsupervised_clusters);
        self.meta.import(snapshot.meta_window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{Backend, NoopCache, PersistentStore, StoreConfig};
    use std::sync::Arc;

    async fn framework() -> LearningFramework {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        let store = Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache)));
        LearningFramework::new(ExperienceDb::new(store))
    }

    #[tokio::test]
    async fn snapshot_then_restore_round_trips_q_value() {
        let framework = framework().await;
        framework
            .learn("ag1", "run", serde_json::json!({"x": 1}), serde_json::json!({"y": 2}), true, serde_json::json!({}), None)
            .await
            .unwrap();
        let snapshot = framework.snapshot();

        let fresh = framework().await;
        fresh.restore(snapshot);
        let state = ReinforcementLearner::derive_state(&serde_json::json!({"x": 1}));
        assert_eq!(fresh.reinforcement.value(&state, "run"), framework.reinforcement.value(&state, "run"));
    }

    #[tokio::test]
    async fn recommend_on_empty_history_never_panics() {
        let framework = framework().await;
        let recs = framework.recommend(&serde_json::json!({"action_type": "run", "input": {}}));
        assert!(recs.is_empty());
    }

    #[tokio::test]
    async fn learn_updates_all_four_learners() {
        let framework = framework().await;
        framework
            .learn("ag1", "run", serde_json::json!({"x": 1}), serde_json::json!({"y": 2}), true, serde_json::json!({}), None)
            .await
            .unwrap();
        assert!(!framework.supervised.find_similar(&serde_json::json!({"x": 1}), "run", 0.0).is_empty());
        assert!(!framework.unsupervised.patterns().is_empty() || framework.unsupervised.anomalies().len() == 1);
        assert!(framework.meta.strategy().is_none());
    }
}
