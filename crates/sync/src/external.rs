//! Pluggable endpoints reconciled against each other (spec §4.7 "Reconciles
//! one entity at a time between a local store and an external system").
//!
//! Neither side's concrete wiring (an OJS client, a local manuscript table)
//! is specified; both are modeled symmetrically behind the same interface,
//! mirroring the `ModelScorer`/`ProcessTask` injected-dependency pattern
//! used elsewhere in this system.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::SyncResult;

/// One side of a reconciliation: can be read (`fetch`) and written
/// (`push`) by `(entity_type, entity_id)`.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Returns the current payload for `(entity_type, entity_id)`, if any.
    async fn fetch(&self, entity_type: &str, entity_id: &str) -> SyncResult<Option<Value>>;

    /// Overwrites the payload for `(entity_type, entity_id)`.
    async fn push(&self, entity_type: &str, entity_id: &str, payload: Value) -> SyncResult<()>;
}

/// An in-memory `EntitySource`, useful for tests and as a default local
/// side when no host-specific store is wired in.
#[derive(Debug, Default)]
pub struct InMemoryEntitySource {
    entries: Mutex<HashMap<(String, String), Value>>,
}

impl InMemoryEntitySource {
    /// Builds an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an entry directly, bypassing `push` (test convenience).
    pub fn seed(&self, entity_type: &str, entity_id: &str, payload: Value) {
        self.entries.lock().insert((entity_type.to_string(), entity_id.to_string()), payload);
    }
}

#[async_trait]
impl EntitySource for InMemoryEntitySource {
    async fn fetch(&self, entity_type: &str, entity_id: &str) -> SyncResult<Option<Value>> {
        Ok(self.entries.lock().get(&(entity_type.to_string(), entity_id.to_string())).cloned())
    }

    async fn push(&self, entity_type: &str, entity_id: &str, payload: Value) -> SyncResult<()> {
        self.entries.lock().insert((entity_type.to_string(), entity_id.to_string()), payload);
        Ok(())
    }
}
