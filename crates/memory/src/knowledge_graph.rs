//! Directed multigraph of typed relations (spec §4.2 "KnowledgeGraph").

use std::sync::Arc;

use chrono::Utc;
use folio_store::{deterministic_id, KnowledgeRelation, PersistentStore};

use crate::error::MemoryResult;

/// A retrieval-intent view over `KnowledgeRelation`s.
#[derive(Clone)]
pub struct KnowledgeGraph {
    store: Arc<PersistentStore>,
}

impl KnowledgeGraph {
    /// Wraps a store handle.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Upserts a relation on its deterministic `(source, target, type)` id (law L1).
    pub async fn add(
        &self,
        source: &str,
        target: &str,
        relation_type: &str,
        confidence: f64,
        metadata: serde_json::Value,
    ) -> MemoryResult<String> {
        let relation = KnowledgeRelation {
            id: deterministic_id(&[source, target, relation_type]),
            source_id: source.to_string(),
            target_id: target.to_string(),
            relation_type: relation_type.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            metadata,
            created_at: Utc::now(),
        };
        let stored = self.store.upsert_relation(relation).await?;
        Ok(stored.id)
    }

    /// All relations touching `node_id`, either as source or target.
    pub async fn relations_for(&self, node_id: &str) -> MemoryResult<Vec<KnowledgeRelation>> {
        Ok(self.store.relations_for_node(node_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{Backend, NoopCache, StoreConfig};
    use std::sync::Arc as StdArc;

    async fn graph() -> KnowledgeGraph {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        KnowledgeGraph::new(Arc::new(PersistentStore::from_parts(backend, StdArc::new(NoopCache))))
    }

    #[tokio::test]
    async fn add_twice_upserts_confidence_law_l1() {
        let graph = graph().await;
        graph.add("x", "y", "related", 0.4, serde_json::json!({})).await.unwrap();
        graph.add("x", "y", "related", 0.9, serde_json::json!({})).await.unwrap();
        let relations = graph.relations_for("x").await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].confidence, 0.9);
    }
}
