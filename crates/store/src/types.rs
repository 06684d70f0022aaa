//! Entity types persisted by the store (spec §3).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority band shared by goals, constraints, and risks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Lowest priority.
    Low,
    /// Default priority.
    Medium,
    /// Elevated priority.
    High,
    /// Must-address priority.
    Critical,
}

impl Priority {
    /// Numeric ordering used for tie-breaking and sort keys.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }
}

/// Kind of a persisted memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Vector embedding payload.
    Vector,
    /// Knowledge graph relation payload.
    Knowledge,
    /// Experience replay payload.
    Experience,
    /// Free-form contextual payload.
    Context,
}

impl MemoryKind {
    /// Stable string form used in the schema and in ids.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Knowledge => "knowledge",
            Self::Experience => "experience",
            Self::Context => "context",
        }
    }
}

/// A tagged, importance-weighted piece of durable context (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Deterministic identifier: `(agent_id, kind, content-hash prefix)`.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Retrieval intent.
    pub kind: MemoryKind,
    /// Structured payload.
    pub content: serde_json::Value,
    /// Structured metadata.
    pub metadata: serde_json::Value,
    /// Clamped to `[0, 1]`.
    pub importance: f64,
    /// Free-form tags.
    pub tags: BTreeSet<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last time this entry was read.
    pub accessed_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Clamps importance into `[0, 1]` (invariant I1).
    pub fn clamp_importance(&mut self) {
        self.importance = self.importance.clamp(0.0, 1.0);
    }
}

/// A stored embedding, unique on `content_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEmbedding {
    /// Identifier.
    pub id: String,
    /// Hash of the embedded content; unique key.
    pub content_hash: String,
    /// Fixed-dimension vector.
    pub vector: Vec<f32>,
    /// Arbitrary metadata.
    pub metadata: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A directed, typed edge in the knowledge graph. Upserted on `(source, target, type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRelation {
    /// Deterministic identifier.
    pub id: String,
    /// Source node id.
    pub source_id: String,
    /// Target node id.
    pub target_id: String,
    /// Relation type.
    pub relation_type: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Arbitrary metadata.
    pub metadata: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Append-only record of one action's input/output/outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceRecord {
    /// Identifier.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Action type recorded.
    pub action_type: String,
    /// Action input.
    pub input: serde_json::Value,
    /// Action output.
    pub output: serde_json::Value,
    /// Whether the action succeeded.
    pub success: bool,
    /// Free-form metrics.
    pub metrics: serde_json::Value,
    /// Free-form feedback.
    pub feedback: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Correlation id threading this experience to a workflow run, if any.
    pub correlation_id: Option<String>,
}

/// Lifecycle status of a `Goal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Actively pursued.
    Active,
    /// Reached its target.
    Completed,
    /// Temporarily suspended.
    Paused,
    /// Could not be achieved.
    Failed,
}

/// A durable intent with a priority, targets, and optional deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Identifier.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Human-readable description.
    pub description: String,
    /// Priority band.
    pub priority: Priority,
    /// Target metrics, free-form.
    pub target_metrics: serde_json::Value,
    /// Optional deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// Lifecycle status.
    pub status: GoalStatus,
    /// Progress in `[0, 1]`.
    pub progress: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Category of a `Constraint`, dictating its violation predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Budget over a named resource.
    Resource,
    /// Maximum estimated duration.
    Time,
    /// Minimum acceptable quality score.
    Quality,
    /// Forbidden action-type set.
    Policy,
}

/// A bound an agent's decisions must respect (or merely report on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// Identifier.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Category.
    pub kind: ConstraintKind,
    /// Human-readable description.
    pub description: String,
    /// Kind-specific parameters (e.g. `{"resource": "cpu", "budget": 0.5}`).
    pub parameters: serde_json::Value,
    /// Whether a violation blocks the decision.
    pub strict: bool,
    /// Priority band.
    pub priority: Priority,
    /// Whether the constraint is currently enforced.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Derived severity of a `RiskFactor`, bucketed from `probability * impact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// `score < 0.2`.
    Minimal,
    /// `0.2 <= score < 0.4`.
    Low,
    /// `0.4 <= score < 0.6`.
    Medium,
    /// `0.6 <= score < 0.8`.
    High,
    /// `score >= 0.8`.
    Critical,
}

impl RiskLevel {
    /// Derives the bucket from a `probability * impact` score (invariant I2).
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Critical
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else if score >= 0.2 {
            Self::Low
        } else {
            Self::Minimal
        }
    }
}

/// A risk an agent's decisions must weigh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Identifier.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Category.
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Probability in `[0, 1]`.
    pub probability: f64,
    /// Impact in `[0, 1]`.
    pub impact: f64,
    /// Derived severity bucket.
    pub level: RiskLevel,
    /// Mitigation notes.
    pub mitigations: Vec<String>,
    /// Monitor identifiers/descriptions.
    pub monitors: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl RiskFactor {
    /// Recomputes `level` from `probability * impact` (invariant I2).
    pub fn recompute_level(&mut self) {
        self.level = RiskLevel::from_score(self.probability * self.impact);
    }
}

/// One step of a `Plan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based step number.
    pub number: u32,
    /// Human-readable description.
    pub description: String,
    /// Action type this step will execute.
    pub action_type: String,
    /// Estimated duration in seconds.
    pub duration_est: f64,
    /// Resource name -> required amount.
    pub required_resources: serde_json::Map<String, serde_json::Value>,
    /// Criteria for considering the step successful.
    pub success_criteria: Vec<String>,
    /// Risk factor ids relevant to this step.
    pub risk_factors: Vec<String>,
}

/// Lifecycle status of a `Plan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Newly created, not yet started.
    Draft,
    /// Currently being executed.
    Active,
    /// Finished successfully.
    Completed,
    /// Could not be completed.
    Failed,
}

/// An ordered list of steps to achieve a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Identifier.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Goal this plan serves.
    pub goal_id: String,
    /// Human-readable description.
    pub description: String,
    /// Ordered steps.
    pub steps: Vec<PlanStep>,
    /// Total estimated duration (sum of step durations).
    pub duration_est: f64,
    /// Resource name -> required amount (max over steps).
    pub resource_requirements: serde_json::Map<String, serde_json::Value>,
    /// Probability of success in `[0, 1]`.
    pub success_probability: f64,
    /// Contingency descriptions.
    pub contingencies: Vec<String>,
    /// Lifecycle status.
    pub status: PlanStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Runtime-only task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in queue.
    Pending,
    /// Currently being processed.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished with a handled failure.
    Failed,
    /// Finished with an unhandled error.
    Error,
}

/// A unit of work queued for an agent. Not persisted to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Identifier.
    pub id: String,
    /// Task payload.
    pub data: serde_json::Value,
    /// Priority in `[0, 1]`; higher runs first.
    pub priority: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Current status.
    pub status: TaskStatus,
    /// Result once processed.
    pub result: Option<serde_json::Value>,
}

/// Reconciliation direction for a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Reconcile both ways, detecting conflicts first.
    Bidirectional,
    /// Push local state to the external system.
    ToExternal,
    /// Pull external state into the local system.
    FromExternal,
}

/// Outcome state of a `SyncRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Queued, not yet attempted.
    Pending,
    /// Currently being synced; at most one per `(entity_type, entity_id)`.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed,
    /// Diverging hashes detected and unresolved.
    Conflict,
}

/// A persisted attempt to reconcile one entity with the external system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Identifier.
    pub id: String,
    /// External addressing: entity type.
    pub entity_type: String,
    /// External addressing: entity id.
    pub entity_id: String,
    /// Direction attempted.
    pub direction: SyncDirection,
    /// Outcome state.
    pub status: SyncStatus,
    /// Content hash of the payload at sync time (invariant I5 excludes timestamps).
    pub data_hash: Option<String>,
    /// Wall-clock time of this attempt.
    pub timestamp: DateTime<Utc>,
    /// Number of retries performed so far.
    pub retry_count: u32,
    /// Error message, if failed.
    pub error: Option<String>,
    /// Conflict payload, if a conflict was detected.
    pub conflict_data: Option<serde_json::Value>,
    /// Correlation id of the workflow run (if any) that triggered this sync.
    pub correlation_id: Option<String>,
}

/// A detected divergence between local and external payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Identifier.
    pub id: String,
    /// External addressing: entity type.
    pub entity_type: String,
    /// External addressing: entity id.
    pub entity_id: String,
    /// External payload at detection time.
    pub external_data: serde_json::Value,
    /// Local payload at detection time.
    pub local_data: serde_json::Value,
    /// Resolution strategy applied (or pending).
    pub strategy: String,
    /// Resolved snapshot, once resolved.
    pub resolved_data: Option<serde_json::Value>,
    /// Resolution time, once resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A sync lifecycle event, persisted append-only (spec §4.7 "Events").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Identifier.
    pub id: String,
    /// External addressing: entity type.
    pub entity_type: String,
    /// External addressing: entity id.
    pub entity_id: String,
    /// `sync_started` | `sync_completed` | `sync_failed`.
    pub event_type: String,
    /// Correlation id grouping a sync attempt's events.
    pub correlation_id: String,
    /// Free-form payload (`direction`, `sync_id`, ...).
    pub payload: serde_json::Value,
    /// Occurrence time.
    pub occurred_at: DateTime<Utc>,
}

/// Report produced by a garbage-collection pass (spec §3 "Lifecycle").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcReport {
    /// Memory entries deleted.
    pub memory_deleted: u64,
    /// Experience records deleted.
    pub experiences_deleted: u64,
    /// Sync records deleted.
    pub sync_records_deleted: u64,
}

/// Deterministic id helper: `sha`-free, collision-resistant enough for the
/// idempotence laws of spec §8 (L1) without pulling in a cryptographic hash.
#[must_use]
pub fn deterministic_id(parts: &[&str]) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for part in parts {
        part.hash(&mut hasher);
        0u8.hash(&mut hasher); // separator so ("ab","c") != ("a","bc")
    }
    format!("{:016x}", hasher.finish())
}

/// Generates a fresh random identifier for append-only entities.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
