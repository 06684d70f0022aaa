//! Agent goal lifecycle (spec §4.4 "GoalManager").

use std::sync::Arc;

use chrono::Utc;
use folio_store::{new_id, Goal, GoalStatus, PersistentStore, Priority};

use crate::error::DecisionResult;

/// Creates, progresses, and lists an agent's goals.
#[derive(Clone)]
pub struct GoalManager {
    store: Arc<PersistentStore>,
    agent_id: String,
}

impl GoalManager {
    /// Scopes goal management to one agent.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>, agent_id: impl Into<String>) -> Self {
        Self { store, agent_id: agent_id.into() }
    }

    /// Creates a goal, returning its id.
    pub async fn create(
        &self,
        description: impl Into<String>,
        target_metrics: serde_json::Value,
        priority: Priority,
        deadline: Option<chrono::DateTime<Utc>>,
    ) -> DecisionResult<String> {
        let now = Utc::now();
        let goal = Goal {
            id: new_id(),
            agent_id: self.agent_id.clone(),
            description: description.into(),
            priority,
            target_metrics,
            deadline,
            status: GoalStatus::Active,
            progress: 0.0,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.create_goal(goal).await?;
        Ok(stored.id)
    }

    /// Updates progress and, optionally, status.
    pub async fn update_progress(&self, id: &str, progress: f64, status: Option<GoalStatus>) -> DecisionResult<()> {
        self.store.update_goal_progress(id, progress, status).await?;
        Ok(())
    }

    /// Active goals, ordered `(priority desc, created_at asc)`.
    pub async fn list_active(&self) -> DecisionResult<Vec<Goal>> {
        Ok(self.store.list_active_goals(&self.agent_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{Backend, NoopCache, StoreConfig};

    async fn manager() -> GoalManager {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        GoalManager::new(Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache))), "ag1")
    }

    #[tokio::test]
    async fn deadline_in_past_still_returned() {
        let manager = manager().await;
        manager
            .create("keep going", serde_json::json!({}), Priority::Medium, Some(Utc::now() - chrono::Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(manager.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn completed_goal_drops_out_of_active() {
        let manager = manager().await;
        let id = manager.create("finish", serde_json::json!({}), Priority::Low, None).await.unwrap();
        manager.update_progress(&id, 1.0, Some(GoalStatus::Completed)).await.unwrap();
        assert!(manager.list_active().await.unwrap().is_empty());
    }
}
