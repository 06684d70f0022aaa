#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Four retrieval-intent facades over `folio_store::PersistentStore`.
//!
//! Each facade is stateless: it holds a reference to the store and never the
//! reverse, so there is never a lifetime cycle to manage.

pub mod context_memory;
pub mod error;
pub mod experience_db;
pub mod knowledge_graph;
pub mod vector_store;

pub use context_memory::ContextMemory;
pub use error::{MemoryError, MemoryResult};
pub use experience_db::ExperienceDb;
pub use knowledge_graph::KnowledgeGraph;
pub use vector_store::{cosine_similarity, VectorStore};

use std::sync::Arc;

use folio_store::PersistentStore;

/// Convenience bundle of all four facades over one store.
#[derive(Clone)]
pub struct MemorySubsystem {
    /// Cosine-similarity retrieval over embeddings.
    pub vectors: VectorStore,
    /// Directed multigraph of typed relations.
    pub knowledge: KnowledgeGraph,
    /// Append-only action history.
    pub experiences: ExperienceDb,
    /// Free-form, importance-weighted context.
    pub context: ContextMemory,
}

impl MemorySubsystem {
    /// Builds all four facades over one shared store handle.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>) -> Self {
        Self {
            vectors: VectorStore::new(Arc::clone(&store)),
            knowledge: KnowledgeGraph::new(Arc::clone(&store)),
            experiences: ExperienceDb::new(Arc::clone(&store)),
            context: ContextMemory::new(store),
        }
    }
}
