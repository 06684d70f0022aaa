//! Free-form, importance-weighted context retrieval (spec §4.2 "ContextMemory").

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use folio_store::{deterministic_id, hashing, MemoryEntry, MemoryKind, PersistentStore};

use crate::error::MemoryResult;

/// A retrieval-intent view over `MemoryEntry`s of kind `context`.
#[derive(Clone)]
pub struct ContextMemory {
    store: Arc<PersistentStore>,
}

impl ContextMemory {
    /// Wraps a store handle.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Stores a context entry, deterministic on `(agent_id, context, content hash)`.
    pub async fn store(
        &self,
        agent_id: &str,
        content: serde_json::Value,
        metadata: serde_json::Value,
        importance: f64,
        tags: BTreeSet<String>,
    ) -> MemoryResult<String> {
        let content_hash = hashing::content_hash(&content, &[]);
        let now = Utc::now();
        let entry = MemoryEntry {
            id: deterministic_id(&[agent_id, "context", &content_hash]),
            agent_id: agent_id.to_string(),
            kind: MemoryKind::Context,
            content,
            metadata,
            importance,
            tags,
            created_at: now,
            accessed_at: now,
        };
        let stored = self.store.upsert_memory(entry).await?;
        Ok(stored.id)
    }

    /// Retrieves context entries, optionally filtered by a case-insensitive
    /// substring `query` over the serialized content and metadata.
    pub async fn retrieve(
        &self,
        agent_id: &str,
        query: Option<&str>,
        limit: u32,
        min_importance: f64,
    ) -> MemoryResult<Vec<MemoryEntry>> {
        let entries = self
            .store
            .query_memory(agent_id, Some(MemoryKind::Context), min_importance, limit)
            .await?;
        let Some(query) = query else { return Ok(entries) };
        let needle = query.to_lowercase();
        Ok(entries
            .into_iter()
            .filter(|entry| {
                entry.content.to_string().to_lowercase().contains(&needle)
                    || entry.metadata.to_string().to_lowercase().contains(&needle)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{Backend, NoopCache, StoreConfig};
    use std::sync::Arc as StdArc;

    async fn memory() -> ContextMemory {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        ContextMemory::new(Arc::new(PersistentStore::from_parts(backend, StdArc::new(NoopCache))))
    }

    #[tokio::test]
    async fn retrieve_filters_by_query_substring() {
        let memory = memory().await;
        memory
            .store("ag1", serde_json::json!({"note": "submission accepted"}), serde_json::json!({}), 0.8, BTreeSet::new())
            .await
            .unwrap();
        memory
            .store("ag1", serde_json::json!({"note": "unrelated event"}), serde_json::json!({}), 0.8, BTreeSet::new())
            .await
            .unwrap();
        let hits = memory.retrieve("ag1", Some("accepted"), 10, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn importance_clamped_above_one() {
        let memory = memory().await;
        let id = memory
            .store("ag1", serde_json::json!({}), serde_json::json!({}), 5.0, BTreeSet::new())
            .await
            .unwrap();
        let entries = memory.retrieve("ag1", None, 10, 0.0).await.unwrap();
        assert_eq!(entries.iter().find(|e| e.id == id).unwrap().importance, 1.0);
    }
}
