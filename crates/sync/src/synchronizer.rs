//! `Synchronizer`: entity reconciliation, advisory locks, conflict handling,
//! background draining (spec §4.7).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use folio_store::hashing::{content_hash, DEFAULT_TIMESTAMP_FIELDS};
use folio_store::{new_id, ConflictRecord, PersistentStore, SyncDirection, SyncEvent, SyncRecord, SyncStatus};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{info, warn};

use crate::conflict::resolve;
use crate::error::{SyncError, SyncResult};
use crate::external::EntitySource;
use crate::types::{HealthStatus, SyncConfig, SyncHealth, SyncStats};

enum DirectionOutcome {
    Applied { hash: String },
    Missing,
    Conflict { local: Value, external: Value },
}

#[derive(Default)]
struct Totals {
    total: u64,
    success: u64,
    failure: u64,
    conflicts: u64,
    conflicts_resolved: u64,
    last_sync: Option<chrono::DateTime<Utc>>,
}

struct QueueEntry {
    entity_type: String,
    entity_id: String,
    direction: SyncDirection,
    retry_count: u32,
}

/// Reconciles entities between a local side and an external system, one at
/// a time per `(entity_type, entity_id)`.
pub struct Synchronizer {
    store: Arc<PersistentStore>,
    local: Arc<dyn EntitySource>,
    external: Arc<dyn EntitySource>,
    config: SyncConfig,
    in_flight: Mutex<HashSet<(String, String)>>,
    queue: Mutex<VecDeque<QueueEntry>>,
    totals: Mutex<Totals>,
}

impl Synchronizer {
    /// Builds a synchronizer over `store`'s advisory-lock cache and the
    /// given local/external endpoints.
    #[must_use]
    pub fn new(store: Arc<PersistentStore>, local: Arc<dyn EntitySource>, external: Arc<dyn EntitySource>, config: SyncConfig) -> Self {
        Self {
            store,
            local,
            external,
            config,
            in_flight: Mutex::new(HashSet::new()),
            queue: Mutex::new(VecDeque::new()),
            totals: Mutex::new(Totals::default()),
        }
    }

    /// Reconciles one entity, serialized both in-process and (if a KV cache
    /// is configured) via a distributed advisory lock (invariant I4).
    pub async fn sync_entity(&self, entity_type: &str, entity_id: &str, direction: SyncDirection) -> SyncResult<bool> {
        let key = (entity_type.to_string(), entity_id.to_string());
        if !self.in_flight.lock().insert(key.clone()) {
            return Err(SyncError::AlreadyInFlight(format!("{entity_type}:{entity_id}")));
        }

        let lock_key = format!("sync:{entity_type}:{entity_id}");
        let token = new_id();
        let cache = self.store.cache();
        let distributed = cache.is_available();
        if distributed {
            if !cache.set_nx(&lock_key, &token, 60).await? {
                self.in_flight.lock().remove(&key);
                return Err(SyncError::Locked(lock_key));
            }
        } else {
            warn!(entity_type, entity_id, "distributed sync serialization degraded: no KV cache configured");
        }

        let result = self.run_sync(entity_type, entity_id, direction).await;

        if distributed {
            let _ = cache.delete_if_matches(&lock_key, &token).await;
        }
        self.in_flight.lock().remove(&key);
        result
    }

    async fn run_sync(&self, entity_type: &str, entity_id: &str, direction: SyncDirection) -> SyncResult<bool> {
        let correlation_id = new_id();
        let record_id = new_id();
        let now = Utc::now();

        self.store
            .put_sync_record(&SyncRecord {
                id: record_id.clone(),
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                direction,
                status: SyncStatus::InProgress,
                data_hash: None,
                timestamp: now,
                retry_count: 0,
                error: None,
                conflict_data: None,
                correlation_id: Some(correlation_id.clone()),
            })
            .await?;
        self.emit(entity_type, entity_id, "sync_started", &correlation_id, serde_json::json!({"direction": direction_label(direction)}))
            .await;

        let outcome = match direction {
            SyncDirection::FromExternal => self.sync_from_external(entity_type, entity_id).await,
            SyncDirection::ToExternal => self.sync_to_external(entity_type, entity_id).await,
            SyncDirection::Bidirectional => self.sync_bidirectional(entity_type, entity_id).await,
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.finish(&record_id, entity_type, entity_id, direction, now, SyncStatus::Failed, None, None, Some(err.to_string()), &correlation_id, false)
                    .await;
                return Err(err);
            }
        };

        match outcome {
            DirectionOutcome::Applied { hash } => {
                self.finish(&record_id, entity_type, entity_id, direction, now, SyncStatus::Completed, Some(hash), None, None, &correlation_id, true)
                    .await;
                Ok(true)
            }
            DirectionOutcome::Missing => {
                self.finish(
                    &record_id,
                    entity_type,
                    entity_id,
                    direction,
                    now,
                    SyncStatus::Failed,
                    None,
                    None,
                    Some("entity not present on the required side".to_string()),
                    &correlation_id,
                    false,
                )
                .await;
                Ok(false)
            }
            DirectionOutcome::Conflict { local, external } => {
                let resolution = resolve(self.config.strategy, &local, &external, &self.config.merge_fields, now);
                {
                    let mut totals = self.totals.lock();
                    totals.conflicts += 1;
                    if resolution.resolved {
                        totals.conflicts_resolved += 1;
                    }
                }
                if resolution.push_local {
                    self.local.push(entity_type, entity_id, resolution.winner.clone()).await?;
                }
                if resolution.push_external {
                    self.external.push(entity_type, entity_id, resolution.winner.clone()).await?;
                }
                if !resolution.resolved {
                    self.store
                        .put_conflict(&ConflictRecord {
                            id: new_id(),
                            entity_type: entity_type.to_string(),
                            entity_id: entity_id.to_string(),
                            external_data: external,
                            local_data: local,
                            strategy: self.config.strategy.label().to_string(),
                            resolved_data: None,
                            resolved_at: None,
                            created_at: now,
                        })
                        .await?;
                }
                let hash = content_hash(&resolution.winner, DEFAULT_TIMESTAMP_FIELDS);
                let status = if resolution.resolved { SyncStatus::Completed } else { SyncStatus::Conflict };
                self.finish(&record_id, entity_type, entity_id, direction, now, status, Some(hash), None, None, &correlation_id, resolution.resolved)
                    .await;
                Ok(resolution.resolved)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        record_id: &str,
        entity_type: &str,
        entity_id: &str,
        direction: SyncDirection,
        started_at: chrono::DateTime<Utc>,
        status: SyncStatus,
        hash: Option<String>,
        conflict_data: Option<Value>,
        error: Option<String>,
        correlation_id: &str,
        success: bool,
    ) {
        let record = SyncRecord {
            id: record_id.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            direction,
            status,
            data_hash: hash,
            timestamp: Utc::now(),
            retry_count: 0,
            error: error.clone(),
            conflict_data,
            correlation_id: Some(correlation_id.to_string()),
        };
        if let Err(err) = self.store.put_sync_record(&record).await {
            warn!(entity_type, entity_id, error = %err, "failed to persist sync record");
        }

        let mut totals = self.totals.lock();
        totals.total += 1;
        totals.last_sync = Some(started_at);
        if success {
            totals.success += 1;
        } else {
            totals.failure += 1;
        }
        drop(totals);

        let event_type = if success { "sync_completed" } else { "sync_failed" };
        self.emit(entity_type, entity_id, event_type, correlation_id, serde_json::json!({"error": error})).await;
        info!(entity_type, entity_id, event_type, "sync attempt finished");
    }

    async fn emit(&self, entity_type: &str, entity_id: &str, event_type: &str, correlation_id: &str, payload: Value) {
        let event = SyncEvent {
            id: new_id(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type: event_type.to_string(),
            correlation_id: correlation_id.to_string(),
            payload,
            occurred_at: Utc::now(),
        };
        if let Err(err) = self.store.record_sync_event(&event).await {
            warn!(entity_type, entity_id, error = %err, "failed to record sync event");
        }
    }

    async fn sync_from_external(&self, entity_type: &str, entity_id: &str) -> SyncResult<DirectionOutcome> {
        let Some(payload) = self.external.fetch(entity_type, entity_id).await? else {
            return Ok(DirectionOutcome::Missing);
        };
        self.local.push(entity_type, entity_id, payload.clone()).await?;
        Ok(DirectionOutcome::Applied { hash: content_hash(&payload, DEFAULT_TIMESTAMP_FIELDS) })
    }

    async fn sync_to_external(&self, entity_type: &str, entity_id: &str) -> SyncResult<DirectionOutcome> {
        let Some(payload) = self.local.fetch(entity_type, entity_id).await? else {
            return Ok(DirectionOutcome::Missing);
        };
        self.external.push(entity_type, entity_id, payload.clone()).await?;
        Ok(DirectionOutcome::Applied { hash: content_hash(&payload, DEFAULT_TIMESTAMP_FIELDS) })
    }

    async fn sync_bidirectional(&self, entity_type: &str, entity_id: &str) -> SyncResult<DirectionOutcome> {
        let local = self.local.fetch(entity_type, entity_id).await?;
        let external = self.external.fetch(entity_type, entity_id).await?;
        match (local, external) {
            (Some(local), Some(external)) => {
                let local_hash = content_hash(&local, DEFAULT_TIMESTAMP_FIELDS);
                let external_hash = content_hash(&external, DEFAULT_TIMESTAMP_FIELDS);
                if local_hash == external_hash {
                    return Ok(DirectionOutcome::Applied { hash: local_hash });
                }
                Ok(DirectionOutcome::Conflict { local, external })
            }
            (Some(local), None) => {
                self.external.push(entity_type, entity_id, local.clone()).await?;
                Ok(DirectionOutcome::Applied { hash: content_hash(&local, DEFAULT_TIMESTAMP_FIELDS) })
            }
            (None, Some(external)) => {
                self.local.push(entity_type, entity_id, external.clone()).await?;
                Ok(DirectionOutcome::Applied { hash: content_hash(&external, DEFAULT_TIMESTAMP_FIELDS) })
            }
            (None, None) => Ok(DirectionOutcome::Missing),
        }
    }

    /// Reconciles many entities of the same type with bounded concurrency.
    pub async fn batch_sync(&self, entity_type: &str, ids: &[String], direction: SyncDirection) -> HashMap<String, bool> {
        use futures::stream::StreamExt;
        futures::stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let ok = self.sync_entity(entity_type, &id, direction).await.unwrap_or(false);
                (id, ok)
            })
            .buffer_unordered(self.config.batch_concurrency)
            .collect()
            .await
    }

    /// Enqueues a sync for the background worker to drain; never blocks.
    pub fn queue_sync(&self, entity_type: &str, entity_id: &str, direction: SyncDirection) {
        self.queue.lock().push_back(QueueEntry {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            direction,
            retry_count: 0,
        });
    }

    /// Drains up to `batch_size` queued entries, retrying transient
    /// failures up to `retry_limit`, then runs sync-record GC.
    pub async fn run_worker_cycle(&self) -> SyncResult<()> {
        let batch: Vec<QueueEntry> = {
            let mut queue = self.queue.lock();
            let mut batch = Vec::new();
            for _ in 0..self.config.batch_size {
                match queue.pop_front() {
                    Some(entry) => batch.push(entry),
                    None => break,
                }
            }
            batch
        };

        for entry in batch {
            match self.sync_entity(&entry.entity_type, &entry.entity_id, entry.direction).await {
                Ok(_) => {}
                Err(_) if entry.retry_count < self.config.retry_limit => {
                    self.queue.lock().push_back(QueueEntry { retry_count: entry.retry_count + 1, ..entry });
                }
                Err(err) => {
                    warn!(entity_type = %entry.entity_type, entity_id = %entry.entity_id, error = %err, "queued sync exhausted retries");
                }
            }
        }

        self.store.gc_sync_records(Utc::now() - chrono::Duration::days(self.config.sync_record_max_age_days)).await?;
        Ok(())
    }

    /// Runs `run_worker_cycle` on `worker_interval_secs`, backing off to
    /// `worker_error_backoff_secs` after a cycle errors. Intended to be
    /// spawned once per process lifetime.
    pub async fn run_worker(self: Arc<Self>) {
        loop {
            let wait = match self.run_worker_cycle().await {
                Ok(()) => self.config.worker_interval_secs,
                Err(err) => {
                    warn!(error = %err, "sync worker cycle failed");
                    self.config.worker_error_backoff_secs
                }
            };
            tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
        }
    }

    /// Most recent sync record for `(entity_type, entity_id)`, if any.
    pub async fn get_status(&self, entity_type: &str, entity_id: &str) -> SyncResult<Option<SyncRecord>> {
        Ok(self.store.get_sync_status(entity_type, entity_id).await?)
    }

    /// Conflicts awaiting manual resolution.
    pub async fn get_pending_conflicts(&self) -> SyncResult<Vec<ConflictRecord>> {
        Ok(self.store.get_pending_conflicts().await?)
    }

    /// Applies `data` as the final reconciled payload for a pending
    /// conflict, pushing it to both sides.
    pub async fn resolve_conflict(&self, id: &str, data: Value) -> SyncResult<bool> {
        let Some(mut conflict) = self.store.get_conflict(id).await? else {
            return Ok(false);
        };
        self.local.push(&conflict.entity_type, &conflict.entity_id, data.clone()).await?;
        self.external.push(&conflict.entity_type, &conflict.entity_id, data.clone()).await?;
        conflict.resolved_data = Some(data);
        conflict.resolved_at = Some(Utc::now());
        self.store.put_conflict(&conflict).await?;
        self.totals.lock().conflicts_resolved += 1;
        Ok(true)
    }

    /// `{total, success, failure, conflicts, last_sync, pending_conflicts,
    /// queue_size, in_flight}` snapshot.
    pub async fn stats(&self) -> SyncResult<SyncStats> {
        let pending_conflicts = self.store.get_pending_conflicts().await?.len() as u64;
        let totals = self.totals.lock();
        Ok(SyncStats {
            total: totals.total,
            success: totals.success,
            failure: totals.failure,
            conflicts: totals.conflicts,
            conflicts_resolved: totals.conflicts_resolved,
            last_sync: totals.last_sync,
            pending_conflicts,
            queue_size: self.queue.lock().len(),
            in_flight: self.in_flight.lock().len(),
        })
    }

    /// `{status, issues}` health summary.
    #[must_use]
    pub fn health(&self) -> SyncHealth {
        let mut issues = Vec::new();
        if !self.store.cache().is_available() {
            issues.push("distributed sync serialization degraded: no KV cache configured".to_string());
        }
        let totals = self.totals.lock();
        if totals.total >= 5 && totals.failure as f64 / totals.total as f64 > 0.5 {
            issues.push(format!("failure rate {}/{} exceeds 0.5", totals.failure, totals.total));
        }
        let status = if issues.iter().any(|issue| issue.contains("failure rate")) {
            HealthStatus::Unhealthy
        } else if !issues.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        SyncHealth { status, issues }
    }
}

fn direction_label(direction: SyncDirection) -> &'static str {
    match direction {
        SyncDirection::Bidirectional => "bidirectional",
        SyncDirection::ToExternal => "to_external",
        SyncDirection::FromExternal => "from_external",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::InMemoryEntitySource;
    use folio_store::{Backend, NoopCache, StoreConfig};

    async fn harness() -> (Synchronizer, Arc<InMemoryEntitySource>, Arc<InMemoryEntitySource>) {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        let store = Arc::new(PersistentStore::from_parts(backend, Arc::new(NoopCache)));
        let local = Arc::new(InMemoryEntitySource::new());
        let external = Arc::new(InMemoryEntitySource::new());
        let sync = Synchronizer::new(store, local.clone(), external.clone(), SyncConfig::default());
        (sync, local, external)
    }

    #[tokio::test]
    async fn scenario_s2_bidirectional_latest_wins_remote_newer() {
        let (sync, local, external) = harness().await;
        local.seed("manuscript", "m1", serde_json::json!({"title": "A", "last_updated": "2024-01-01T10:00:00Z"}));
        external.seed("manuscript", "m1", serde_json::json!({"title": "B", "last_updated": "2024-01-01T11:00:00Z"}));

        let ok = sync.sync_entity("manuscript", "m1", SyncDirection::Bidirectional).await.unwrap();
        assert!(ok);

        let local_after = local.fetch("manuscript", "m1").await.unwrap().unwrap();
        assert_eq!(local_after["title"], "B");

        let stats = sync.stats().await.unwrap();
        assert_eq!(stats.conflicts_resolved, 1);
    }

    #[tokio::test]
    async fn scenario_boundary_from_external_missing_fails() {
        let (sync, _local, _external) = harness().await;
        let ok = sync.sync_entity("manuscript", "missing", SyncDirection::FromExternal).await.unwrap();
        assert!(!ok);
        let status = sync.get_status("manuscript", "missing").await.unwrap().unwrap();
        assert_eq!(status.status, SyncStatus::Failed);
    }

    #[tokio::test]
    async fn law_l2_unchanged_bidirectional_sync_is_idempotent() {
        let (sync, local, external) = harness().await;
        let payload = serde_json::json!({"title": "same"});
        local.seed("manuscript", "m2", payload.clone());
        external.seed("manuscript", "m2", payload);

        sync.sync_entity("manuscript", "m2", SyncDirection::Bidirectional).await.unwrap();
        sync.sync_entity("manuscript", "m2", SyncDirection::Bidirectional).await.unwrap();

        let stats = sync.stats().await.unwrap();
        assert_eq!(stats.conflicts, 0);
    }

    struct TestCache {
        entries: Mutex<HashMap<String, (String, tokio::time::Instant)>>,
    }

    impl TestCache {
        fn new() -> Self {
            Self { entries: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait::async_trait]
    impl folio_store::KvCache for TestCache {
        fn is_available(&self) -> bool {
            true
        }

        async fn set_nx(&self, key: &str, value: &str, ttl_secs: u64) -> folio_store::StoreResult<bool> {
            let mut entries = self.entries.lock();
            let now = tokio::time::Instant::now();
            if let Some((_, expires_at)) = entries.get(key) {
                if *expires_at > now {
                    return Ok(false);
                }
            }
            entries.insert(key.to_string(), (value.to_string(), now + std::time::Duration::from_secs(ttl_secs)));
            Ok(true)
        }

        async fn get(&self, key: &str) -> folio_store::StoreResult<Option<String>> {
            Ok(self.entries.lock().get(key).map(|(value, _)| value.clone()))
        }

        async fn delete_if_matches(&self, key: &str, token: &str) -> folio_store::StoreResult<bool> {
            let mut entries = self.entries.lock();
            if entries.get(key).map(|(value, _)| value.as_str()) == Some(token) {
                entries.remove(key);
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_s6_advisory_lock_releases_after_ttl() {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        let cache: Arc<dyn folio_store::KvCache> = Arc::new(TestCache::new());
        let store = Arc::new(PersistentStore::from_parts(backend, cache));
        let local = Arc::new(InMemoryEntitySource::new());
        let external = Arc::new(InMemoryEntitySource::new());
        local.seed("m", "1", serde_json::json!({"title": "A"}));
        external.seed("m", "1", serde_json::json!({"title": "A"}));

        assert!(store.cache().set_nx("sync:m:1", "agent-a-token", 60).await.unwrap());

        let sync = Synchronizer::new(store.clone(), local, external, SyncConfig::default());
        let err = sync.sync_entity("m", "1", SyncDirection::Bidirectional).await.unwrap_err();
        assert!(matches!(err, SyncError::Locked(_)));

        tokio::time::advance(std::time::Duration::from_secs(61)).await;

        let ok = sync.sync_entity("m", "1", SyncDirection::Bidirectional).await.unwrap();
        assert!(ok);

        let stats = sync.stats().await.unwrap();
        assert_eq!(stats.success, 1);
    }
}
