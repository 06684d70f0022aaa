//! Cosine-similarity retrieval over embeddings (spec §4.2 "VectorStore").

use std::sync::Arc;

use chrono::Utc;
use folio_store::{deterministic_id, PersistentStore, VectorEmbedding};

use crate::error::MemoryResult;

/// A retrieval-intent view over embeddings. Holds no state beyond a store handle.
#[derive(Clone)]
pub struct VectorStore {
    store: Arc<PersistentStore>,
}

impl VectorStore {
    /// Wraps a store handle.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self { store }
    }

    /// Upserts an embedding keyed on `content_hash`, returning its id.
    pub async fn store(
        &self,
        content_hash: &str,
        vector: Vec<f32>,
        metadata: serde_json::Value,
    ) -> MemoryResult<String> {
        let embedding = VectorEmbedding {
            id: deterministic_id(&[content_hash]),
            content_hash: content_hash.to_string(),
            vector,
            metadata,
            created_at: Utc::now(),
        };
        let stored = self.store.upsert_vector(embedding).await?;
        Ok(stored.id)
    }

    /// The `k` embeddings most similar to `query` by cosine similarity.
    ///
    /// Ties are broken by insertion order: the comparison is stable and the
    /// underlying rows come back in storage order.
    pub async fn find_similar(&self, query: &[f32], k: usize) -> MemoryResult<Vec<(String, f64)>> {
        let all = self.store.all_vectors_bare().await?;
        let mut scored: Vec<(String, f64)> = all
            .into_iter()
            .map(|(id, vector)| (id, cosine_similarity(query, &vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Cosine similarity between two vectors; `0.0` if either is zero-length or zero-norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for i in 0..len {
        let x = f64::from(a[i]);
        let y = f64::from(b[i]);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{Backend, NoopCache, StoreConfig};
    use std::sync::Arc as StdArc;

    async fn test_store() -> PersistentStore {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        PersistentStore::from_parts(backend, StdArc::new(NoopCache))
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-9);
    }

    #[tokio::test]
    async fn find_similar_on_empty_store_returns_empty() {
        let store = VectorStore::new(Arc::new(test_store().await));
        let hits = store.find_similar(&[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn store_is_idempotent_on_content_hash() {
        let store = VectorStore::new(Arc::new(test_store().await));
        let id1 = store.store("h1", vec![1.0, 0.0], serde_json::json!({})).await.unwrap();
        let id2 = store.store("h1", vec![0.5, 0.5], serde_json::json!({})).await.unwrap();
        assert_eq!(id1, id2);
    }
}
