#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Durable storage for memory, experience, goal, sync, and conflict records.
//!
//! `PersistentStore` is the single durability boundary the rest of the
//! runtime depends on; every other crate talks to storage through it rather
//! than touching `sqlx` or Redis directly.

pub mod backend;
pub mod config;
pub mod error;
pub mod hashing;
pub mod lock;
pub mod store;
pub mod types;

pub use backend::Backend;
pub use config::{BackendTarget, Environment, RedisConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use lock::{KvCache, NoopCache};
pub use store::PersistentStore;
pub use types::{
    ConflictRecord, Constraint, ConstraintKind, ExperienceRecord, GcReport, Goal, GoalStatus,
    KnowledgeRelation, MemoryEntry, MemoryKind, Plan, PlanStatus, PlanStep, Priority, RiskFactor,
    RiskLevel, SyncDirection, SyncEvent, SyncRecord, SyncStatus, Task, TaskStatus,
    VectorEmbedding, deterministic_id, new_id,
};

#[cfg(feature = "redis-cache")]
pub use lock::RedisCache;
