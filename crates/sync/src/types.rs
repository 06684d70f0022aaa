//! Synchronizer-scoped configuration and observability types (spec §4.7).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::conflict::ConflictStrategy;

/// Tunables for `Synchronizer`; all have sane defaults.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Max concurrent reconciliations in one `batch_sync` call.
    pub batch_concurrency: usize,
    /// Entries drained from the queue per background worker cycle.
    pub batch_size: usize,
    /// Re-enqueue attempts before a queued sync is marked `failed` for good.
    pub retry_limit: u32,
    /// Background worker polling interval.
    pub worker_interval_secs: u64,
    /// Worker polling interval after a cycle raises an error.
    pub worker_error_backoff_secs: u64,
    /// Sync records older than this (days) and in a terminal state are
    /// eligible for garbage collection.
    pub sync_record_max_age_days: i64,
    /// Default conflict resolution strategy.
    pub strategy: ConflictStrategy,
    /// Fields taken from the local side by the `merge` strategy.
    pub merge_fields: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: 8,
            batch_size: 50,
            retry_limit: 3,
            worker_interval_secs: 30,
            worker_error_backoff_secs: 5,
            sync_record_max_age_days: 30,
            strategy: ConflictStrategy::LatestWins,
            merge_fields: vec!["agent_analysis".to_string(), "quality_score".to_string(), "recommendations".to_string()],
        }
    }
}

/// `stats()` snapshot (spec §4.7).
#[derive(Debug, Clone, Serialize)]
pub struct SyncStats {
    /// Total `sync_entity` attempts recorded.
    pub total: u64,
    /// Attempts that completed successfully.
    pub success: u64,
    /// Attempts that failed outright.
    pub failure: u64,
    /// Conflicts detected (resolved or not).
    pub conflicts: u64,
    /// Conflicts resolved automatically (not left `manual`).
    pub conflicts_resolved: u64,
    /// Timestamp of the most recent attempt, if any.
    pub last_sync: Option<DateTime<Utc>>,
    /// Conflicts currently awaiting manual resolution.
    pub pending_conflicts: u64,
    /// Entries still waiting in the background queue.
    pub queue_size: usize,
    /// `(entity_type, entity_id)` pairs currently mid-sync.
    pub in_flight: usize,
}

/// Health bucket shared across components (SPEC_FULL §B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No issues detected.
    Healthy,
    /// Operating, but a non-fatal issue was observed.
    Degraded,
    /// Not able to make progress.
    Unhealthy,
}

/// `health()` summary (spec §4.7).
#[derive(Debug, Clone, Serialize)]
pub struct SyncHealth {
    /// Overall health bucket.
    pub status: HealthStatus,
    /// Human-readable issue descriptions, empty when healthy.
    pub issues: Vec<String>,
}
