//! Tabular Q-learning with epsilon-greedy action selection (spec §4.3 "ReinforcementLearner").

use std::collections::HashMap;

use folio_store::hashing;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Q-learning hyperparameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReinforcementParams {
    /// Learning rate.
    pub alpha: f64,
    /// Discount factor.
    pub gamma: f64,
    /// Exploration probability.
    pub epsilon: f64,
}

impl Default for ReinforcementParams {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.1,
        }
    }
}

/// Maintains `Q[state][action]` and selects actions epsilon-greedily.
pub struct ReinforcementLearner {
    table: Mutex<HashMap<String, HashMap<String, f64>>>,
    params: Mutex<ReinforcementParams>,
}

impl Default for ReinforcementLearner {
    fn default() -> Self {
        Self::new(ReinforcementParams::default())
    }
}

impl ReinforcementLearner {
    /// Builds a learner with the given hyperparameters.
    #[must_use]
    pub fn new(params: ReinforcementParams) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            params: Mutex::new(params),
        }
    }

    /// Replaces the current hyperparameters (used by `MetaLearner` strategy adjustments).
    pub fn set_params(&self, params: ReinforcementParams) {
        *self.params.lock() = params;
    }

    /// Current hyperparameters.
    #[must_use]
    pub fn params(&self) -> ReinforcementParams {
        *self.params.lock()
    }

    /// Derives a state key by content-hashing an action's inputs.
    #[must_use]
    pub fn derive_state(value: &serde_json::Value) -> String {
        hashing::content_hash(value, &[])
    }

    /// Value of `Q[state][action]`, `0.0` if unseen.
    #[must_use]
    pub fn value(&self, state: &str, action: &str) -> f64 {
        self.table
            .lock()
            .get(state)
            .and_then(|actions| actions.get(action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Picks an action: with probability `epsilon`, uniformly at random; otherwise
    /// the argmax over `Q[state][*]` among `available`, falling back to the first
    /// available action if the state is unseen.
    #[must_use]
    pub fn select_action(&self, state: &str, available: &[String]) -> Option<String> {
        if available.is_empty() {
            return None;
        }
        let epsilon = self.params.lock().epsilon;
        if rand::thread_rng().gen::<f64>() < epsilon {
            let idx = rand::thread_rng().gen_range(0..available.len());
            return Some(available[idx].clone());
        }
        let table = self.table.lock();
        let best = table.get(state).and_then(|actions| {
            available
                .iter()
                .map(|a| (a, actions.get(a).copied().unwrap_or(0.0)))
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        });
        Some(best.map_or_else(|| available[0].clone(), |(a, _)| a.clone()))
    }

    /// Exports the Q-table and hyperparameters for self-persistence (spec §4.5 "save").
    #[must_use]
    pub fn export(&self) -> (HashMap<String, HashMap<String, f64>>, ReinforcementParams) {
        (self.table.lock().clone(), self.params())
    }

    /// Restores a previously exported Q-table and hyperparameters.
    pub fn import(&self, table: HashMap<String, HashMap<String, f64>>, params: ReinforcementParams) {
        *self.table.lock() = table;
        self.set_params(params);
    }

    /// Q-learning update: `Q[s][a] += alpha * (r + gamma * max_a' Q[s'][a'] - Q[s][a])`.
    pub fn update(&self, state: &str, action: &str, reward: f64, next_state: &str) {
        let params = *self.params.lock();
        let mut table = self.table.lock();
        let max_next = table
            .get(next_state)
            .and_then(|actions| actions.values().copied().fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v)))))
            .unwrap_or(0.0);
        let entry = table.entry(state.to_string()).or_default();
        let current = entry.get(action).copied().unwrap_or(0.0);
        let updated = current + params.alpha * (reward + params.gamma * max_next - current);
        entry.insert(action.to_string(), updated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_matches_scenario_s4() {
        let learner = ReinforcementLearner::default();
        learner.update("S1", "A1", 1.0, "S2");
        assert!((learner.value("S1", "A1") - 0.1).abs() < 1e-9);
    }

    #[test]
    fn repeated_positive_reward_asymptotes_below_ten() {
        let learner = ReinforcementLearner::default();
        for _ in 0..1000 {
            learner.update("S1", "A1", 1.0, "S2");
        }
        let value = learner.value("S1", "A1");
        assert!(value < 10.0 && value > 9.0, "value was {value}");
    }

    #[test]
    fn select_action_falls_back_to_first_when_unseen() {
        let learner = ReinforcementLearner::new(ReinforcementParams {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.0,
        });
        let actions = vec!["a".to_string(), "b".to_string()];
        assert_eq!(learner.select_action("unseen", &actions), Some("a".to_string()));
    }

    #[test]
    fn select_action_on_empty_available_is_none() {
        let learner = ReinforcementLearner::default();
        assert_eq!(learner.select_action("s", &[]), None);
    }
}
