//! Bounded labeled-example store with a hand-rolled similarity metric
//! (spec §4.3 "SupervisedLearner").

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cap on retained examples per `action_type` before the oldest 50 are dropped.
const MAX_EXAMPLES: usize = 100;
const DROP_ON_OVERFLOW: usize = 50;

/// One labeled input/output pair observed for an action type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedExample {
    /// Action input.
    pub input: Value,
    /// Action output.
    pub output: Value,
    /// Whether the action succeeded.
    pub success: bool,
}

/// A similarity hit returned by `find_similar`.
#[derive(Debug, Clone)]
pub struct SimilarHit {
    /// The matched example's input.
    pub input: Value,
    /// The matched example's output.
    pub output: Value,
    /// The matched example's outcome.
    pub success: bool,
    /// Similarity score in `[0, 1]`.
    pub similarity: f64,
}

/// Stores recent labeled examples per action type and finds similar ones.
#[derive(Default)]
pub struct SupervisedLearner {
    by_action: Mutex<HashMap<String, VecDeque<SupervisedExample>>>,
}

impl SupervisedLearner {
    /// Builds an empty learner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one example, bounding the per-action-type window.
    pub fn record(&self, action_type: &str, input: Value, output: Value, success: bool) {
        let mut by_action = self.by_action.lock();
        let examples = by_action.entry(action_type.to_string()).or_default();
        examples.push_back(SupervisedExample { input, output, success });
        if examples.len() > MAX_EXAMPLES {
            for _ in 0..DROP_ON_OVERFLOW {
                examples.pop_front();
            }
        }
    }

    /// Examples for `action_type` whose similarity to `input` is at least `threshold`.
    #[must_use]
    pub fn find_similar(&self, input: &Value, action_type: &str, threshold: f64) -> Vec<SimilarHit> {
        let by_action = self.by_action.lock();
        let Some(examples) = by_action.get(action_type) else {
            return Vec::new();
        };
        examples
            .iter()
            .filter_map(|example| {
                let similarity = similarity(input, &example.input);
                (similarity >= threshold).then(|| SimilarHit {
                    input: example.input.clone(),
                    output: example.output.clone(),
                    success: example.success,
                    similarity,
                })
            })
            .collect()
    }

    /// Exports all retained examples for self-persistence (spec §4.5 "save").
    #[must_use]
    pub fn export(&self) -> HashMap<String, VecDeque<SupervisedExample>> {
        self.by_action.lock().clone()
    }

    /// Restores a previously exported example store.
    pub fn import(&self, by_action: HashMap<String, VecDeque<SupervisedExample>>) {
        *self.by_action.lock() = by_action;
    }
}

/// Average of key-set Jaccard and per-shared-key value similarity.
#[must_use]
pub fn similarity(a: &Value, b: &Value) -> f64 {
    let (Value::Object(a), Value::Object(b)) = (a, b) else {
        return if a == b { 1.0 } else { 0.0 };
    };
    let keys_a: std::collections::BTreeSet<_> = a.keys().collect();
    let keys_b: std::collections::BTreeSet<_> = b.keys().collect();
    let union = keys_a.union(&keys_b).count();
    let jaccard = if union == 0 {
        1.0
    } else {
        keys_a.intersection(&keys_b).count() as f64 / union as f64
    };
    let shared: Vec<_> = keys_a.intersection(&keys_b).collect();
    let value_similarity = if shared.is_empty() {
        0.0
    } else {
        let total: f64 = shared.iter().map(|key| value_similarity(&a[**key], &b[**key])).sum();
        total / shared.len() as f64
    };
    (jaccard + value_similarity) / 2.0
}

fn value_similarity(a: &Value, b: &Value) -> f64 {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            let max = a.abs().max(b.abs());
            if max == 0.0 {
                1.0
            } else {
                (1.0 - (a - b).abs() / max).max(0.0)
            }
        }
        (Value::String(a), Value::String(b)) => {
            if a.eq_ignore_ascii_case(b) {
                1.0
            } else if a.to_lowercase().contains(&b.to_lowercase()) || b.to_lowercase().contains(&a.to_lowercase()) {
                0.5
            } else {
                0.0
            }
        }
        (a, b) => f64::from(a == b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_inputs_have_similarity_one() {
        let a = json!({"x": 1, "y": "hello"});
        assert!((similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_keys_have_zero_value_component() {
        let a = json!({"x": 1});
        let b = json!({"y": 2});
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn overflow_drops_oldest_fifty() {
        let learner = SupervisedLearner::new();
        for i in 0..110 {
            learner.record("run", json!({"i": i}), json!({}), true);
        }
        let hits = learner.find_similar(&json!({"i": 0}), "run", 0.0);
        assert_eq!(hits.len(), 60);
    }

    #[test]
    fn find_similar_on_unknown_action_type_is_empty() {
        let learner = SupervisedLearner::new();
        assert!(learner.find_similar(&json!({}), "nope", 0.0).is_empty());
    }
}
