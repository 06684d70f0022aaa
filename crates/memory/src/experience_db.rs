//! Append-only action history (spec §4.2 "ExperienceDB").

use std::sync::Arc;

use chrono::Utc;
use folio_store::{new_id, ExperienceRecord, PersistentStore};

use crate::error::MemoryResult;

/// A retrieval-intent view over `ExperienceRecord`s.
#[derive(Clone)]
pub struct ExperienceDb {
    store: Arc<PersistentStore>,
}

impl ExperienceDb {
    /// Wraps a store handle.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Appends one experience, optionally tagged with a workflow `correlation_id`.
    #[allow(clippy::too_many_arguments)]
    pub async fn log(
        &self,
        agent_id: &str,
        action_type: &str,
        input: serde_json::Value,
        output: serde_json::Value,
        success: bool,
        metrics: serde_json::Value,
        correlation_id: Option<String>,
    ) -> MemoryResult<String> {
        let record = ExperienceRecord {
            id: new_id(),
            agent_id: agent_id.to_string(),
            action_type: action_type.to_string(),
            input,
            output,
            success,
            metrics,
            feedback: serde_json::Value::Null,
            created_at: Utc::now(),
            correlation_id,
        };
        let stored = self.store.log_experience(record).await?;
        Ok(stored.id)
    }

    /// Experiences newest-first, optionally filtered to one action type.
    pub async fn list(
        &self,
        agent_id: &str,
        action_type: Option<&str>,
        limit: u32,
    ) -> MemoryResult<Vec<ExperienceRecord>> {
        Ok(self.store.list_experiences(agent_id, action_type, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{Backend, NoopCache, StoreConfig};
    use std::sync::Arc as StdArc;

    async fn db() -> ExperienceDb {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        ExperienceDb::new(Arc::new(PersistentStore::from_parts(backend, StdArc::new(NoopCache))))
    }

    #[tokio::test]
    async fn log_then_list_round_trips_inputs_invariant_i6() {
        let db = db().await;
        let input = serde_json::json!({"x": 1});
        let output = serde_json::json!({"y": 2});
        let metrics = serde_json::json!({"duration": 1.2});
        db.log("ag1", "run", input.clone(), output.clone(), true, metrics.clone(), None)
            .await
            .unwrap();
        let listed = db.list("ag1", Some("run"), 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].input, input);
        assert_eq!(listed[0].output, output);
        assert_eq!(listed[0].metrics, metrics);
        assert!(listed[0].success);
    }

    #[tokio::test]
    async fn list_newest_first() {
        let db = db().await;
        for i in 0..3 {
            db.log("ag1", "run", serde_json::json!({"i": i}), serde_json::json!({}), true, serde_json::json!({}), None)
                .await
                .unwrap();
        }
        let listed = db.list("ag1", None, 10).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed[0].created_at >= listed[1].created_at);
        assert!(listed[1].created_at >= listed[2].created_at);
    }
}
