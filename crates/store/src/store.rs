//! Typed CRUD and read-queries over the entities of spec §3 (spec §4.1).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

use crate::backend::Backend;
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::lock::{KvCache, NoopCache};
use crate::types::{
    ConflictRecord, Constraint, ConstraintKind, ExperienceRecord, Goal, GoalStatus,
    KnowledgeRelation, MemoryEntry, MemoryKind, Plan, PlanStatus, PlanStep, Priority, RiskFactor,
    RiskLevel, SyncDirection, SyncEvent, SyncRecord, SyncStatus, VectorEmbedding, GcReport,
};

/// Durable storage for every entity in spec §3.
///
/// Backed by either an embedded SQLite file or a networked Postgres pool
/// (spec §4.1) behind one schema; callers never branch on which is live.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Backend,
    cache: Arc<dyn KvCache>,
}

impl PersistentStore {
    /// Connects using `config`, wiring in a Redis-backed cache when configured.
    pub async fn connect(config: StoreConfig) -> StoreResult<Self> {
        let backend = Backend::connect(&config).await?;
        let cache: Arc<dyn KvCache> = match &config.redis {
            #[cfg(feature = "redis-cache")]
            Some(redis_cfg) => Arc::new(crate::lock::RedisCache::connect(redis_cfg).await?),
            #[cfg(not(feature = "redis-cache"))]
            Some(_) => {
                tracing::warn!("REDIS_HOST configured but redis-cache feature disabled; degrading to in-process locks");
                Arc::new(NoopCache)
            }
            None => {
                tracing::warn!("no REDIS_HOST configured; distributed advisory locking is degraded to in-process only");
                Arc::new(NoopCache)
            }
        };
        Ok(Self { backend, cache })
    }

    /// Constructs a store over an already-connected backend (dependency injection, tests).
    #[must_use]
    pub fn from_parts(backend: Backend, cache: Arc<dyn KvCache>) -> Self {
        Self { backend, cache }
    }

    /// The advisory-lock/event cache, if one is configured.
    #[must_use]
    pub fn cache(&self) -> Arc<dyn KvCache> {
        Arc::clone(&self.cache)
    }

    // ---------------------------------------------------------------- memory

    /// Upserts a memory entry, idempotent on `entry.id` (spec §3 invariant: deterministic id).
    pub async fn upsert_memory(&self, mut entry: MemoryEntry) -> StoreResult<MemoryEntry> {
        entry.clamp_importance();
        let tags = serde_json::to_string(&entry.tags)?;
        sqlx::query(
            "INSERT INTO memory_entries (id, agent_id, kind, content, metadata, importance, tags, created_at, accessed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET content = excluded.content, metadata = excluded.metadata,
                importance = excluded.importance, tags = excluded.tags, accessed_at = excluded.accessed_at",
        )
        .bind(&entry.id)
        .bind(&entry.agent_id)
        .bind(entry.kind.as_str())
        .bind(entry.content.to_string())
        .bind(entry.metadata.to_string())
        .bind(entry.importance)
        .bind(tags)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.accessed_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(entry)
    }

    /// Fetches a memory entry by id, updating `accessed_at` best-effort (spec §4.1).
    pub async fn get_memory(&self, id: &str) -> StoreResult<Option<MemoryEntry>> {
        let row = sqlx::query("SELECT * FROM memory_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        let Some(row) = row else { return Ok(None) };
        let entry = memory_from_row(&row)?;
        let now = Utc::now();
        if sqlx::query("UPDATE memory_entries SET accessed_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(self.backend.pool())
            .await
            .is_err()
        {
            tracing::debug!(id, "best-effort accessed_at update failed");
        }
        Ok(Some(entry))
    }

    /// Filtered, ordered memory query (spec §4.1).
    pub async fn query_memory(
        &self,
        agent_id: &str,
        kind: Option<MemoryKind>,
        min_importance: f64,
        limit: u32,
    ) -> StoreResult<Vec<MemoryEntry>> {
        let rows = if let Some(kind) = kind {
            sqlx::query(
                "SELECT * FROM memory_entries WHERE agent_id = ? AND kind = ? AND importance >= ?
                 ORDER BY importance DESC, accessed_at DESC LIMIT ?",
            )
            .bind(agent_id)
            .bind(kind.as_str())
            .bind(min_importance)
            .bind(i64::from(limit))
            .fetch_all(self.backend.pool())
            .await
        } else {
            sqlx::query(
                "SELECT * FROM memory_entries WHERE agent_id = ? AND importance >= ?
                 ORDER BY importance DESC, accessed_at DESC LIMIT ?",
            )
            .bind(agent_id)
            .bind(min_importance)
            .bind(i64::from(limit))
            .fetch_all(self.backend.pool())
            .await
        }
        .map_err(StoreError::from)?;
        rows.iter().map(memory_from_row).collect()
    }

    /// Deletes memory entries older than `max_age` with importance below `min_importance`
    /// (spec §3 "Lifecycle"). Safe to run concurrently with writes.
    pub async fn gc_memory(&self, cutoff: DateTime<Utc>, min_importance: f64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM memory_entries WHERE created_at < ? AND importance < ?")
            .bind(cutoff.to_rfc3339())
            .bind(min_importance)
            .execute(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        Ok(result.rows_affected())
    }

    // ---------------------------------------------------------------- vectors

    /// Upserts an embedding, unique on `content_hash`.
    pub async fn upsert_vector(&self, embedding: VectorEmbedding) -> StoreResult<VectorEmbedding> {
        let vector = serde_json::to_string(&embedding.vector)?;
        sqlx::query(
            "INSERT INTO vector_embeddings (id, content_hash, vector, metadata, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (content_hash) DO UPDATE SET vector = excluded.vector, metadata = excluded.metadata",
        )
        .bind(&embedding.id)
        .bind(&embedding.content_hash)
        .bind(vector)
        .bind(embedding.metadata.to_string())
        .bind(embedding.created_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(embedding)
    }

    /// Loads only `(id, vector)` pairs, deliberately skipping metadata, so similarity
    /// search stays linear in corpus size rather than quadratic (spec §4.2).
    pub async fn all_vectors_bare(&self) -> StoreResult<Vec<(String, Vec<f32>)>> {
        let rows = sqlx::query("SELECT id, vector FROM vector_embeddings")
            .fetch_all(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(StoreError::from)?;
                let raw: String = row.try_get("vector").map_err(StoreError::from)?;
                let vector: Vec<f32> = serde_json::from_str(&raw)?;
                Ok((id, vector))
            })
            .collect()
    }

    // ------------------------------------------------------------ knowledge

    /// Upserts a relation on its deterministic `(source, target, type)` id (law L1).
    pub async fn upsert_relation(&self, relation: KnowledgeRelation) -> StoreResult<KnowledgeRelation> {
        sqlx::query(
            "INSERT INTO knowledge_relations (id, source_id, target_id, relation_type, confidence, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET confidence = excluded.confidence, metadata = excluded.metadata",
        )
        .bind(&relation.id)
        .bind(&relation.source_id)
        .bind(&relation.target_id)
        .bind(&relation.relation_type)
        .bind(relation.confidence)
        .bind(relation.metadata.to_string())
        .bind(relation.created_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(relation)
    }

    /// Relations touching `node_id`, either as source or target.
    pub async fn relations_for_node(&self, node_id: &str) -> StoreResult<Vec<KnowledgeRelation>> {
        let rows = sqlx::query("SELECT * FROM knowledge_relations WHERE source_id = ? OR target_id = ?")
            .bind(node_id)
            .bind(node_id)
            .fetch_all(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        rows.iter().map(relation_from_row).collect()
    }

    // ----------------------------------------------------------- experience

    /// Appends an experience record (never mutated after insertion).
    pub async fn log_experience(&self, record: ExperienceRecord) -> StoreResult<ExperienceRecord> {
        sqlx::query(
            "INSERT INTO experience_records (id, agent_id, action_type, input, output, success, metrics, feedback, created_at, correlation_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.agent_id)
        .bind(&record.action_type)
        .bind(record.input.to_string())
        .bind(record.output.to_string())
        .bind(record.success)
        .bind(record.metrics.to_string())
        .bind(record.feedback.to_string())
        .bind(record.created_at.to_rfc3339())
        .bind(&record.correlation_id)
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(record)
    }

    /// Lists experiences newest-first, optionally filtered by action type.
    pub async fn list_experiences(
        &self,
        agent_id: &str,
        action_type: Option<&str>,
        limit: u32,
    ) -> StoreResult<Vec<ExperienceRecord>> {
        let rows = if let Some(action_type) = action_type {
            sqlx::query(
                "SELECT * FROM experience_records WHERE agent_id = ? AND action_type = ?
                 ORDER BY created_at DESC LIMIT ?",
            )
            .bind(agent_id)
            .bind(action_type)
            .bind(i64::from(limit))
            .fetch_all(self.backend.pool())
            .await
        } else {
            sqlx::query("SELECT * FROM experience_records WHERE agent_id = ? ORDER BY created_at DESC LIMIT ?")
                .bind(agent_id)
                .bind(i64::from(limit))
                .fetch_all(self.backend.pool())
                .await
        }
        .map_err(StoreError::from)?;
        rows.iter().map(experience_from_row).collect()
    }

    /// Deletes experience records older than `cutoff` (spec §3 "Lifecycle", longer window).
    pub async fn gc_experiences(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM experience_records WHERE created_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        Ok(result.rows_affected())
    }

    // ----------------------------------------------------------------- goals

    /// Creates a goal.
    pub async fn create_goal(&self, goal: Goal) -> StoreResult<Goal> {
        sqlx::query(
            "INSERT INTO goals (id, agent_id, description, priority, target_metrics, deadline, status, progress, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&goal.id)
        .bind(&goal.agent_id)
        .bind(&goal.description)
        .bind(priority_str(goal.priority))
        .bind(goal.target_metrics.to_string())
        .bind(goal.deadline.map(|d| d.to_rfc3339()))
        .bind(status_str(goal.status))
        .bind(goal.progress)
        .bind(goal.created_at.to_rfc3339())
        .bind(goal.updated_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(goal)
    }

    /// Updates a goal's progress and, optionally, its status.
    pub async fn update_goal_progress(
        &self,
        id: &str,
        progress: f64,
        status: Option<GoalStatus>,
    ) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        if let Some(status) = status {
            sqlx::query("UPDATE goals SET progress = ?, status = ?, updated_at = ? WHERE id = ?")
                .bind(progress.clamp(0.0, 1.0))
                .bind(status_str(status))
                .bind(now)
                .bind(id)
                .execute(self.backend.pool())
                .await
        } else {
            sqlx::query("UPDATE goals SET progress = ?, updated_at = ? WHERE id = ?")
                .bind(progress.clamp(0.0, 1.0))
                .bind(now)
                .bind(id)
                .execute(self.backend.pool())
                .await
        }
        .map_err(StoreError::from)?;
        Ok(())
    }

    /// Active goals for an agent, ordered `(priority desc, created_at asc)`.
    ///
    /// A goal whose `deadline` has passed is still returned: status is authoritative.
    pub async fn list_active_goals(&self, agent_id: &str) -> StoreResult<Vec<Goal>> {
        let rows = sqlx::query("SELECT * FROM goals WHERE agent_id = ? AND status = 'active'")
            .bind(agent_id)
            .fetch_all(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        let mut goals = rows.iter().map(goal_from_row).collect::<StoreResult<Vec<_>>>()?;
        goals.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(goals)
    }

    // ----------------------------------------------------------- constraints

    /// Adds a constraint.
    pub async fn add_constraint(&self, constraint: Constraint) -> StoreResult<Constraint> {
        sqlx::query(
            "INSERT INTO constraints (id, agent_id, kind, description, parameters, strict, priority, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&constraint.id)
        .bind(&constraint.agent_id)
        .bind(constraint_kind_str(constraint.kind))
        .bind(&constraint.description)
        .bind(constraint.parameters.to_string())
        .bind(constraint.strict)
        .bind(priority_str(constraint.priority))
        .bind(constraint.active)
        .bind(constraint.created_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(constraint)
    }

    /// Active constraints for an agent.
    pub async fn list_constraints(&self, agent_id: &str) -> StoreResult<Vec<Constraint>> {
        let rows = sqlx::query("SELECT * FROM constraints WHERE agent_id = ? AND active = 1")
            .bind(agent_id)
            .fetch_all(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        rows.iter().map(constraint_from_row).collect()
    }

    // ---------------------------------------------------------------- risks

    /// Adds a risk factor, deriving its level from `probability * impact`.
    pub async fn add_risk(&self, mut risk: RiskFactor) -> StoreResult<RiskFactor> {
        risk.recompute_level();
        sqlx::query(
            "INSERT INTO risk_factors (id, agent_id, kind, description, probability, impact, level, mitigations, monitors, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&risk.id)
        .bind(&risk.agent_id)
        .bind(&risk.kind)
        .bind(&risk.description)
        .bind(risk.probability)
        .bind(risk.impact)
        .bind(risk_level_str(risk.level))
        .bind(serde_json::to_string(&risk.mitigations)?)
        .bind(serde_json::to_string(&risk.monitors)?)
        .bind(risk.created_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(risk)
    }

    /// Risk factors for an agent.
    pub async fn list_risks(&self, agent_id: &str) -> StoreResult<Vec<RiskFactor>> {
        let rows = sqlx::query("SELECT * FROM risk_factors WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_all(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        rows.iter().map(risk_from_row).collect()
    }

    // ---------------------------------------------------------------- plans

    /// Creates a plan.
    pub async fn create_plan(&self, plan: Plan) -> StoreResult<Plan> {
        sqlx::query(
            "INSERT INTO plans (id, agent_id, goal_id, description, steps, duration_est, resource_requirements, success_probability, contingencies, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&plan.id)
        .bind(&plan.agent_id)
        .bind(&plan.goal_id)
        .bind(&plan.description)
        .bind(serde_json::to_string(&plan.steps)?)
        .bind(plan.duration_est)
        .bind(serde_json::Value::Object(plan.resource_requirements.clone()).to_string())
        .bind(plan.success_probability)
        .bind(serde_json::to_string(&plan.contingencies)?)
        .bind(plan_status_str(plan.status))
        .bind(plan.created_at.to_rfc3339())
        .bind(plan.updated_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(plan)
    }

    /// Fetches a plan by id.
    pub async fn get_plan(&self, id: &str) -> StoreResult<Option<Plan>> {
        let row = sqlx::query("SELECT * FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        row.as_ref().map(plan_from_row).transpose()
    }

    /// Replaces a plan's mutable fields (steps, duration, status) after adaptation.
    pub async fn update_plan(&self, plan: &Plan) -> StoreResult<()> {
        sqlx::query(
            "UPDATE plans SET steps = ?, duration_est = ?, resource_requirements = ?, success_probability = ?, contingencies = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(serde_json::to_string(&plan.steps)?)
        .bind(plan.duration_est)
        .bind(serde_json::Value::Object(plan.resource_requirements.clone()).to_string())
        .bind(plan.success_probability)
        .bind(serde_json::to_string(&plan.contingencies)?)
        .bind(plan_status_str(plan.status))
        .bind(Utc::now().to_rfc3339())
        .bind(&plan.id)
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    // ------------------------------------------------------------------ sync

    /// Inserts or replaces a sync record.
    pub async fn put_sync_record(&self, record: &SyncRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sync_records (id, entity_type, entity_id, direction, status, data_hash, timestamp, retry_count, error, conflict_data, correlation_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET status = excluded.status, data_hash = excluded.data_hash,
                timestamp = excluded.timestamp, retry_count = excluded.retry_count, error = excluded.error,
                conflict_data = excluded.conflict_data",
        )
        .bind(&record.id)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(sync_direction_str(record.direction))
        .bind(sync_status_str(record.status))
        .bind(&record.data_hash)
        .bind(record.timestamp.to_rfc3339())
        .bind(i64::from(record.retry_count))
        .bind(&record.error)
        .bind(record.conflict_data.as_ref().map(ToString::to_string))
        .bind(&record.correlation_id)
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    /// Most recent sync record for `(entity_type, entity_id)`, if any.
    pub async fn get_sync_status(&self, entity_type: &str, entity_id: &str) -> StoreResult<Option<SyncRecord>> {
        let row = sqlx::query(
            "SELECT * FROM sync_records WHERE entity_type = ? AND entity_id = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        row.as_ref().map(sync_record_from_row).transpose()
    }

    /// Whether any sync record for `(entity_type, entity_id)` currently holds `in_progress`
    /// (invariant I4 support query).
    pub async fn has_in_progress_sync(&self, entity_type: &str, entity_id: &str) -> StoreResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as c FROM sync_records WHERE entity_type = ? AND entity_id = ? AND status = 'in_progress'",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        let count: i64 = row.try_get("c").map_err(StoreError::from)?;
        Ok(count > 0)
    }

    /// Deletes sync records older than `cutoff` whose status is terminal.
    pub async fn gc_sync_records(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM sync_records WHERE timestamp < ? AND status IN ('completed', 'failed')",
        )
        .bind(cutoff.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(result.rows_affected())
    }

    /// Records a conflict.
    pub async fn put_conflict(&self, conflict: &ConflictRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sync_conflicts (id, entity_type, entity_id, external_data, local_data, strategy, resolved_data, resolved_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET resolved_data = excluded.resolved_data, resolved_at = excluded.resolved_at",
        )
        .bind(&conflict.id)
        .bind(&conflict.entity_type)
        .bind(&conflict.entity_id)
        .bind(conflict.external_data.to_string())
        .bind(conflict.local_data.to_string())
        .bind(&conflict.strategy)
        .bind(conflict.resolved_data.as_ref().map(ToString::to_string))
        .bind(conflict.resolved_at.map(|t| t.to_rfc3339()))
        .bind(conflict.created_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    /// Conflicts awaiting manual resolution.
    pub async fn get_pending_conflicts(&self) -> StoreResult<Vec<ConflictRecord>> {
        let rows = sqlx::query("SELECT * FROM sync_conflicts WHERE resolved_at IS NULL")
            .fetch_all(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        rows.iter().map(conflict_from_row).collect()
    }

    /// Fetches a single conflict by id.
    pub async fn get_conflict(&self, id: &str) -> StoreResult<Option<ConflictRecord>> {
        let row = sqlx::query("SELECT * FROM sync_conflicts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.backend.pool())
            .await
            .map_err(StoreError::from)?;
        row.as_ref().map(conflict_from_row).transpose()
    }

    /// Persists a sync lifecycle event (spec §4.7 "Events").
    pub async fn record_sync_event(&self, event: &SyncEvent) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sync_events (id, entity_type, entity_id, event_type, correlation_id, payload, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.entity_type)
        .bind(&event.entity_id)
        .bind(&event.event_type)
        .bind(&event.correlation_id)
        .bind(event.payload.to_string())
        .bind(event.occurred_at.to_rfc3339())
        .execute(self.backend.pool())
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    /// Runs every garbage-collection pass in spec §3 "Lifecycle" and returns a summary.
    pub async fn run_gc(
        &self,
        now: DateTime<Utc>,
        memory_max_age_days: i64,
        memory_min_importance: f64,
        experience_max_age_days: i64,
        sync_record_max_age_days: i64,
    ) -> StoreResult<GcReport> {
        let memory_deleted = self
            .gc_memory(now - chrono::Duration::days(memory_max_age_days), memory_min_importance)
            .await?;
        let experiences_deleted = self
            .gc_experiences(now - chrono::Duration::days(experience_max_age_days))
            .await?;
        let sync_records_deleted = self
            .gc_sync_records(now - chrono::Duration::days(sync_record_max_age_days))
            .await?;
        Ok(GcReport {
            memory_deleted,
            experiences_deleted,
            sync_records_deleted,
        })
    }
}

fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
        Priority::Critical => "critical",
    }
}

fn priority_from_str(s: &str) -> StoreResult<Priority> {
    Ok(match s {
        "low" => Priority::Low,
        "medium" => Priority::Medium,
        "high" => Priority::High,
        "critical" => Priority::Critical,
        other => return Err(StoreError::Validation(format!("unknown priority: {other}"))),
    })
}

fn status_str(s: GoalStatus) -> &'static str {
    match s {
        GoalStatus::Active => "active",
        GoalStatus::Completed => "completed",
        GoalStatus::Paused => "paused",
        GoalStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> StoreResult<GoalStatus> {
    Ok(match s {
        "active" => GoalStatus::Active,
        "completed" => GoalStatus::Completed,
        "paused" => GoalStatus::Paused,
        "failed" => GoalStatus::Failed,
        other => return Err(StoreError::Validation(format!("unknown goal status: {other}"))),
    })
}

fn constraint_kind_str(k: ConstraintKind) -> &'static str {
    match k {
        ConstraintKind::Resource => "resource",
        ConstraintKind::Time => "time",
        ConstraintKind::Quality => "quality",
        ConstraintKind::Policy => "policy",
    }
}

fn constraint_kind_from_str(s: &str) -> StoreResult<ConstraintKind> {
    Ok(match s {
        "resource" => ConstraintKind::Resource,
        "time" => ConstraintKind::Time,
        "quality" => ConstraintKind::Quality,
        "policy" => ConstraintKind::Policy,
        other => return Err(StoreError::Validation(format!("unknown constraint kind: {other}"))),
    })
}

fn risk_level_str(l: RiskLevel) -> &'static str {
    match l {
        RiskLevel::Minimal => "minimal",
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
        RiskLevel::Critical => "critical",
    }
}

fn risk_level_from_str(s: &str) -> StoreResult<RiskLevel> {
    Ok(match s {
        "minimal" => RiskLevel::Minimal,
        "low" => RiskLevel::Low,
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        "critical" => RiskLevel::Critical,
        other => return Err(StoreError::Validation(format!("unknown risk level: {other}"))),
    })
}

fn plan_status_str(s: PlanStatus) -> &'static str {
    match s {
        PlanStatus::Draft => "draft",
        PlanStatus::Active => "active",
        PlanStatus::Completed => "completed",
        PlanStatus::Failed => "failed",
    }
}

fn plan_status_from_str(s: &str) -> StoreResult<PlanStatus> {
    Ok(match s {
        "draft" => PlanStatus::Draft,
        "active" => PlanStatus::Active,
        "completed" => PlanStatus::Completed,
        "failed" => PlanStatus::Failed,
        other => return Err(StoreError::Validation(format!("unknown plan status: {other}"))),
    })
}

fn sync_direction_str(d: SyncDirection) -> &'static str {
    match d {
        SyncDirection::Bidirectional => "bidirectional",
        SyncDirection::ToExternal => "to_external",
        SyncDirection::FromExternal => "from_external",
    }
}

fn sync_direction_from_str(s: &str) -> StoreResult<SyncDirection> {
    Ok(match s {
        "bidirectional" => SyncDirection::Bidirectional,
        "to_external" => SyncDirection::ToExternal,
        "from_external" => SyncDirection::FromExternal,
        other => return Err(StoreError::Validation(format!("unknown sync direction: {other}"))),
    })
}

fn sync_status_str(s: SyncStatus) -> &'static str {
    match s {
        SyncStatus::Pending => "pending",
        SyncStatus::InProgress => "in_progress",
        SyncStatus::Completed => "completed",
        SyncStatus::Failed => "failed",
        SyncStatus::Conflict => "conflict",
    }
}

fn sync_status_from_str(s: &str) -> StoreResult<SyncStatus> {
    Ok(match s {
        "pending" => SyncStatus::Pending,
        "in_progress" => SyncStatus::InProgress,
        "completed" => SyncStatus::Completed,
        "failed" => SyncStatus::Failed,
        "conflict" => SyncStatus::Conflict,
        other => return Err(StoreError::Validation(format!("unknown sync status: {other}"))),
    })
}

fn parse_time(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Validation(format!("bad timestamp {s}: {e}")))
}

fn memory_from_row(row: &AnyRow) -> StoreResult<MemoryEntry> {
    let kind: String = row.try_get("kind").map_err(StoreError::from)?;
    let kind = match kind.as_str() {
        "vector" => MemoryKind::Vector,
        "knowledge" => MemoryKind::Knowledge,
        "experience" => MemoryKind::Experience,
        "context" => MemoryKind::Context,
        other => return Err(StoreError::Validation(format!("unknown memory kind: {other}"))),
    };
    let tags_raw: String = row.try_get("tags").map_err(StoreError::from)?;
    let tags: BTreeSet<String> = serde_json::from_str(&tags_raw)?;
    let content_raw: String = row.try_get("content").map_err(StoreError::from)?;
    let metadata_raw: String = row.try_get("metadata").map_err(StoreError::from)?;
    Ok(MemoryEntry {
        id: row.try_get("id").map_err(StoreError::from)?,
        agent_id: row.try_get("agent_id").map_err(StoreError::from)?,
        kind,
        content: serde_json::from_str(&content_raw)?,
        metadata: serde_json::from_str(&metadata_raw)?,
        importance: row.try_get("importance").map_err(StoreError::from)?,
        tags,
        created_at: parse_time(&row.try_get::<String, _>("created_at").map_err(StoreError::from)?)?,
        accessed_at: parse_time(&row.try_get::<String, _>("accessed_at").map_err(StoreError::from)?)?,
    })
}

fn relation_from_row(row: &AnyRow) -> StoreResult<KnowledgeRelation> {
    let metadata_raw: String = row.try_get("metadata").map_err(StoreError::from)?;
    Ok(KnowledgeRelation {
        id: row.try_get("id").map_err(StoreError::from)?,
        source_id: row.try_get("source_id").map_err(StoreError::from)?,
        target_id: row.try_get("target_id").map_err(StoreError::from)?,
        relation_type: row.try_get("relation_type").map_err(StoreError::from)?,
        confidence: row.try_get("confidence").map_err(StoreError::from)?,
        metadata: serde_json::from_str(&metadata_raw)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at").map_err(StoreError::from)?)?,
    })
}

fn experience_from_row(row: &AnyRow) -> StoreResult<ExperienceRecord> {
    let input_raw: String = row.try_get("input").map_err(StoreError::from)?;
    let output_raw: String = row.try_get("output").map_err(StoreError::from)?;
    let metrics_raw: String = row.try_get("metrics").map_err(StoreError::from)?;
    let feedback_raw: String = row.try_get("feedback").map_err(StoreError::from)?;
    Ok(ExperienceRecord {
        id: row.try_get("id").map_err(StoreError::from)?,
        agent_id: row.try_get("agent_id").map_err(StoreError::from)?,
        action_type: row.try_get("action_type").map_err(StoreError::from)?,
        input: serde_json::from_str(&input_raw)?,
        output: serde_json::from_str(&output_raw)?,
        success: row.try_get("success").map_err(StoreError::from)?,
        metrics: serde_json::from_str(&metrics_raw)?,
        feedback: serde_json::from_str(&feedback_raw)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at").map_err(StoreError::from)?)?,
        correlation_id: crate::backend::opt_text(row, "correlation_id"),
    })
}

fn goal_from_row(row: &AnyRow) -> StoreResult<Goal> {
    let priority: String = row.try_get("priority").map_err(StoreError::from)?;
    let status: String = row.try_get("status").map_err(StoreError::from)?;
    let target_metrics_raw: String = row.try_get("target_metrics").map_err(StoreError::from)?;
    let deadline: Option<String> = row.try_get("deadline").map_err(StoreError::from)?;
    Ok(Goal {
        id: row.try_get("id").map_err(StoreError::from)?,
        agent_id: row.try_get("agent_id").map_err(StoreError::from)?,
        description: row.try_get("description").map_err(StoreError::from)?,
        priority: priority_from_str(&priority)?,
        target_metrics: serde_json::from_str(&target_metrics_raw)?,
        deadline: deadline.map(|d| parse_time(&d)).transpose()?,
        status: status_from_str(&status)?,
        progress: row.try_get("progress").map_err(StoreError::from)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at").map_err(StoreError::from)?)?,
        updated_at: parse_time(&row.try_get::<String, _>("updated_at").map_err(StoreError::from)?)?,
    })
}

fn constraint_from_row(row: &AnyRow) -> StoreResult<Constraint> {
    let kind: String = row.try_get("kind").map_err(StoreError::from)?;
    let priority: String = row.try_get("priority").map_err(StoreError::from)?;
    let parameters_raw: String = row.try_get("parameters").map_err(StoreError::from)?;
    Ok(Constraint {
        id: row.try_get("id").map_err(StoreError::from)?,
        agent_id: row.try_get("agent_id").map_err(StoreError::from)?,
        kind: constraint_kind_from_str(&kind)?,
        description: row.try_get("description").map_err(StoreError::from)?,
        parameters: serde_json::from_str(&parameters_raw)?,
        strict: row.try_get("strict").map_err(StoreError::from)?,
        priority: priority_from_str(&priority)?,
        active: row.try_get("active").map_err(StoreError::from)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at").map_err(StoreError::from)?)?,
    })
}

fn risk_from_row(row: &AnyRow) -> StoreResult<RiskFactor> {
    let level: String = row.try_get("level").map_err(StoreError::from)?;
    let mitigations_raw: String = row.try_get("mitigations").map_err(StoreError::from)?;
    let monitors_raw: String = row.try_get("monitors").map_err(StoreError::from)?;
    Ok(RiskFactor {
        id: row.try_get("id").map_err(StoreError::from)?,
        agent_id: row.try_get("agent_id").map_err(StoreError::from)?,
        kind: row.try_get("kind").map_err(StoreError::from)?,
        description: row.try_get("description").map_err(StoreError::from)?,
        probability: row.try_get("probability").map_err(StoreError::from)?,
        impact: row.try_get("impact").map_err(StoreError::from)?,
        level: risk_level_from_str(&level)?,
        mitigations: serde_json::from_str(&mitigations_raw)?,
        monitors: serde_json::from_str(&monitors_raw)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at").map_err(StoreError::from)?)?,
    })
}

fn plan_from_row(row: &AnyRow) -> StoreResult<Plan> {
    let steps_raw: String = row.try_get("steps").map_err(StoreError::from)?;
    let resources_raw: String = row.try_get("resource_requirements").map_err(StoreError::from)?;
    let contingencies_raw: String = row.try_get("contingencies").map_err(StoreError::from)?;
    let status: String = row.try_get("status").map_err(StoreError::from)?;
    let steps: Vec<PlanStep> = serde_json::from_str(&steps_raw)?;
    let resources: serde_json::Value = serde_json::from_str(&resources_raw)?;
    Ok(Plan {
        id: row.try_get("id").map_err(StoreError::from)?,
        agent_id: row.try_get("agent_id").map_err(StoreError::from)?,
        goal_id: row.try_get("goal_id").map_err(StoreError::from)?,
        description: row.try_get("description").map_err(StoreError::from)?,
        steps,
        duration_est: row.try_get("duration_est").map_err(StoreError::from)?,
        resource_requirements: resources.as_object().cloned().unwrap_or_default(),
        success_probability: row.try_get("success_probability").map_err(StoreError::from)?,
        contingencies: serde_json::from_str(&contingencies_raw)?,
        status: plan_status_from_str(&status)?,
        created_at: parse_time(&row.try_get::<String, _>("created_at").map_err(StoreError::from)?)?,
        updated_at: parse_time(&row.try_get::<String, _>("updated_at").map_err(StoreError::from)?)?,
    })
}

fn sync_record_from_row(row: &AnyRow) -> StoreResult<SyncRecord> {
    let direction: String = row.try_get("direction").map_err(StoreError::from)?;
    let status: String = row.try_get("status").map_err(StoreError::from)?;
    let conflict_data: Option<String> = row.try_get("conflict_data").map_err(StoreError::from)?;
    Ok(SyncRecord {
        id: row.try_get("id").map_err(StoreError::from)?,
        entity_type: row.try_get("entity_type").map_err(StoreError::from)?,
        entity_id: row.try_get("entity_id").map_err(StoreError::from)?,
        direction: sync_direction_from_str(&direction)?,
        status: sync_status_from_str(&status)?,
        data_hash: crate::backend::opt_text(row, "data_hash"),
        timestamp: parse_time(&row.try_get::<String, _>("timestamp").map_err(StoreError::from)?)?,
        retry_count: row.try_get::<i64, _>("retry_count").map_err(StoreError::from)? as u32,
        error: crate::backend::opt_text(row, "error"),
        conflict_data: conflict_data.map(|s| serde_json::from_str(&s)).transpose()?,
        correlation_id: crate::backend::opt_text(row, "correlation_id"),
    })
}

fn conflict_from_row(row: &AnyRow) -> StoreResult<ConflictRecord> {
    let external_raw: String = row.try_get("external_data").map_err(StoreError::from)?;
    let local_raw: String = row.try_get("local_data").map_err(StoreError::from)?;
    let resolved_raw: Option<String> = row.try_get("resolved_data").map_err(StoreError::from)?;
    let resolved_at: Option<String> = row.try_get("resolved_at").map_err(StoreError::from)?;
    Ok(ConflictRecord {
        id: row.try_get("id").map_err(StoreError::from)?,
        entity_type: row.try_get("entity_type").map_err(StoreError::from)?,
        entity_id: row.try_get("entity_id").map_err(StoreError::from)?,
        external_data: serde_json::from_str(&external_raw)?,
        local_data: serde_json::from_str(&local_raw)?,
        strategy: row.try_get("strategy").map_err(StoreError::from)?,
        resolved_data: resolved_raw.map(|s| serde_json::from_str(&s)).transpose()?,
        resolved_at: resolved_at.map(|s| parse_time(&s)).transpose()?,
        created_at: parse_time(&row.try_get::<String, _>("created_at").map_err(StoreError::from)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{deterministic_id, new_id};
    use std::sync::Arc;

    async fn test_store() -> PersistentStore {
        let backend = Backend::connect(&StoreConfig::in_memory()).await.unwrap();
        PersistentStore::from_parts(backend, Arc::new(NoopCache))
    }

    fn sample_memory(agent: &str) -> MemoryEntry {
        let now = Utc::now();
        MemoryEntry {
            id: deterministic_id(&[agent, "context", "hello"]),
            agent_id: agent.to_string(),
            kind: MemoryKind::Context,
            content: serde_json::json!({"text": "hello"}),
            metadata: serde_json::json!({}),
            importance: 1.5,
            tags: BTreeSet::new(),
            created_at: now,
            accessed_at: now,
        }
    }

    #[tokio::test]
    async fn importance_is_clamped_on_write() {
        let store = test_store().await;
        let stored = store.upsert_memory(sample_memory("ag1")).await.unwrap();
        assert_eq!(stored.importance, 1.0);
        let fetched = store.get_memory(&stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.importance, 1.0);
    }

    #[tokio::test]
    async fn memory_store_is_idempotent_on_deterministic_id() {
        let store = test_store().await;
        let first = store.upsert_memory(sample_memory("ag1")).await.unwrap();
        let second = store.upsert_memory(sample_memory("ag1")).await.unwrap();
        assert_eq!(first.id, second.id);
        let all = store.query_memory("ag1", None, 0.0, 10).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn relation_upsert_is_idempotent_law_l1() {
        let store = test_store().await;
        let id = deterministic_id(&["x", "y", "related"]);
        let first = KnowledgeRelation {
            id: id.clone(),
            source_id: "x".into(),
            target_id: "y".into(),
            relation_type: "related".into(),
            confidence: 0.4,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        };
        let mut second = first.clone();
        second.confidence = 0.9;
        store.upsert_relation(first).await.unwrap();
        store.upsert_relation(second).await.unwrap();
        let relations = store.relations_for_node("x").await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn list_active_goals_orders_by_priority_then_age() {
        let store = test_store().await;
        let now = Utc::now();
        for (desc, priority, offset) in [
            ("low-old", Priority::Low, 2),
            ("high-new", Priority::High, 0),
            ("high-old", Priority::High, 1),
        ] {
            store
                .create_goal(Goal {
                    id: new_id(),
                    agent_id: "ag1".into(),
                    description: desc.into(),
                    priority,
                    target_metrics: serde_json::json!({}),
                    deadline: None,
                    status: GoalStatus::Active,
                    progress: 0.0,
                    created_at: now - chrono::Duration::seconds(offset),
                    updated_at: now,
                })
                .await
                .unwrap();
        }
        let goals = store.list_active_goals("ag1").await.unwrap();
        let descriptions: Vec<_> = goals.iter().map(|g| g.description.as_str()).collect();
        assert_eq!(descriptions, vec!["high-old", "high-new", "low-old"]);
    }

    #[tokio::test]
    async fn deadline_in_past_does_not_exclude_active_goal() {
        let store = test_store().await;
        let now = Utc::now();
        store
            .create_goal(Goal {
                id: new_id(),
                agent_id: "ag1".into(),
                description: "still active".into(),
                priority: Priority::Medium,
                target_metrics: serde_json::json!({}),
                deadline: Some(now - chrono::Duration::days(30)),
                status: GoalStatus::Active,
                progress: 0.0,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let goals = store.list_active_goals("ag1").await.unwrap();
        assert_eq!(goals.len(), 1);
    }

    #[tokio::test]
    async fn find_similar_loads_only_id_and_vector() {
        let store = test_store().await;
        let empty = store.all_vectors_bare().await.unwrap();
        assert!(empty.is_empty());
    }
}
