//! Composite-key clustering and anomaly scoring (spec §4.3 "UnsupervisedLearner").

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

/// A cluster of size >= 2, considered a pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// The composite key shared by every member.
    pub key: String,
    /// Number of points in the cluster.
    pub size: usize,
    /// `min(1, size / 10)`.
    pub confidence: f64,
}

/// A point whose cluster frequency fell below 10%.
#[derive(Debug, Clone)]
pub struct Anomaly {
    /// The point's data.
    pub data: Value,
    /// `1 - frequency`.
    pub score: f64,
}

/// Clusters observed data points by a composite key of sorted field names and
/// inferred value kinds.
#[derive(Default)]
pub struct UnsupervisedLearner {
    clusters: Mutex<HashMap<String, Vec<Value>>>,
}

impl UnsupervisedLearner {
    /// Builds an empty learner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `data` to its composite-key cluster.
    pub fn add(&self, data: Value) {
        let key = composite_key(&data);
        self.clusters.lock().entry(key).or_default().push(data);
    }

    /// Clusters of size >= 2.
    #[must_use]
    pub fn patterns(&self) -> Vec<Pattern> {
        self.clusters
            .lock()
            .iter()
            .filter(|(_, points)| points.len() >= 2)
            .map(|(key, points)| Pattern {
                key: key.clone(),
                size: points.len(),
                confidence: (points.len() as f64 / 10.0).min(1.0),
            })
            .collect()
    }

    /// Points belonging to a cluster whose frequency is below 10% of all points seen.
    #[must_use]
    pub fn anomalies(&self) -> Vec<Anomaly> {
        let clusters = self.clusters.lock();
        let total: usize = clusters.values().map(Vec::len).sum();
        if total == 0 {
            return Vec::new();
        }
        let mut out = Vec::new();
        for points in clusters.values() {
            let frequency = points.len() as f64 / total as f64;
            if frequency < 0.1 {
                for point in points {
                    out.push(Anomaly {
                        data: point.clone(),
                        score: 1.0 - frequency,
                    });
                }
            }
        }
        out
    }

    /// Exports all clusters for self-persistence (spec §4.5 "save").
    #[must_use]
    pub fn export(&self) -> HashMap<String, Vec<Value>> {
        self.clusters.lock().clone()
    }

    /// Restores a previously exported cluster map.
    pub fn import(&self, clusters: HashMap<String, Vec<Value>>) {
        *self.clusters.lock() = clusters;
    }
}

/// Sorted key names concatenated with each value's inferred kind, e.g. `"age:number,name:string"`.
#[must_use]
pub fn composite_key(value: &Value) -> String {
    let Value::Object(map) = value else {
        return format!("scalar:{}", kind_of(value));
    };
    let mut parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}:{}", kind_of(v))).collect();
    parts.sort();
    parts.join(",")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cluster_of_two_is_a_pattern() {
        let learner = UnsupervisedLearner::new();
        learner.add(json!({"age": 10, "name": "a"}));
        learner.add(json!({"age": 20, "name": "b"}));
        let patterns = learner.patterns();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].size, 2);
        assert!((patterns[0].confidence - 0.2).abs() < 1e-9);
    }

    #[test]
    fn singleton_cluster_is_an_anomaly() {
        let learner = UnsupervisedLearner::new();
        for _ in 0..9 {
            learner.add(json!({"shape": "common"}));
        }
        learner.add(json!({"shape": "common", "extra": true}));
        let anomalies = learner.anomalies();
        assert_eq!(anomalies.len(), 1);
        assert!((anomalies[0].score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn empty_learner_has_no_anomalies() {
        assert!(UnsupervisedLearner::new().anomalies().is_empty());
    }
}
