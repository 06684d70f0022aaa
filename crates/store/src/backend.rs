//! Connection management for the dual SQLite/Postgres backend (spec §4.1).
//!
//! Both deployment modes share one schema and are driven through `sqlx`'s
//! backend-agnostic `Any` driver, so `PersistentStore` never branches on which
//! engine is live.

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::AnyPool;

use crate::config::{BackendTarget, StoreConfig};
use crate::error::{StoreError, StoreResult};

/// Owns the live connection pool, whichever engine backs it.
#[derive(Debug, Clone)]
pub struct Backend {
    pool: AnyPool,
}

impl Backend {
    /// Connects per `config`, trying failover DSNs in order for a networked target.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = match &config.backend {
            BackendTarget::Embedded { path } => {
                let url = if path == ":memory:" {
                    "sqlite::memory:".to_string()
                } else {
                    format!("sqlite://{path}?mode=rwc")
                };
                AnyPoolOptions::new()
                    .max_connections(1)
                    .connect(&url)
                    .await
                    .map_err(StoreError::from)?
            }
            BackendTarget::Networked { dsns, pool_size } => {
                let mut last_err = None;
                let mut connected = None;
                for dsn in dsns {
                    match AnyPoolOptions::new()
                        .max_connections(*pool_size)
                        .connect(dsn)
                        .await
                    {
                        Ok(pool) => {
                            connected = Some(pool);
                            break;
                        }
                        Err(err) => {
                            tracing::warn!(dsn = %dsn, error = %err, "failover candidate unreachable");
                            last_err = Some(err);
                        }
                    }
                }
                connected.ok_or_else(|| {
                    StoreError::Transient(format!(
                        "all failover DSNs unreachable: {}",
                        last_err.map(|e| e.to_string()).unwrap_or_default()
                    ))
                })?
            }
        };
        let backend = Self { pool };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Borrows the underlying pool for query execution.
    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from)?;
        }
        Ok(())
    }
}

/// Reads a `TEXT` column that may be `NULL`.
pub(crate) fn opt_text(row: &AnyRow, idx: &str) -> Option<String> {
    use sqlx::Row;
    row.try_get::<Option<String>, _>(idx).ok().flatten()
}

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS memory_entries (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        metadata TEXT NOT NULL,
        importance REAL NOT NULL,
        tags TEXT NOT NULL,
        created_at TEXT NOT NULL,
        accessed_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_memory_agent ON memory_entries (agent_id)",
    "CREATE TABLE IF NOT EXISTS vector_embeddings (
        id TEXT PRIMARY KEY,
        content_hash TEXT NOT NULL UNIQUE,
        vector TEXT NOT NULL,
        metadata TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS knowledge_relations (
        id TEXT PRIMARY KEY,
        source_id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        relation_type TEXT NOT NULL,
        confidence REAL NOT NULL,
        metadata TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS experience_records (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        action_type TEXT NOT NULL,
        input TEXT NOT NULL,
        output TEXT NOT NULL,
        success INTEGER NOT NULL,
        metrics TEXT NOT NULL,
        feedback TEXT NOT NULL,
        created_at TEXT NOT NULL,
        correlation_id TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_experience_agent ON experience_records (agent_id, created_at)",
    "CREATE TABLE IF NOT EXISTS goals (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        description TEXT NOT NULL,
        priority TEXT NOT NULL,
        target_metrics TEXT NOT NULL,
        deadline TEXT,
        status TEXT NOT NULL,
        progress REAL NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_goals_agent ON goals (agent_id, status)",
    "CREATE TABLE IF NOT EXISTS constraints (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        description TEXT NOT NULL,
        parameters TEXT NOT NULL,
        strict INTEGER NOT NULL,
        priority TEXT NOT NULL,
        active INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_constraints_agent ON constraints (agent_id)",
    "CREATE TABLE IF NOT EXISTS risk_factors (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        description TEXT NOT NULL,
        probability REAL NOT NULL,
        impact REAL NOT NULL,
        level TEXT NOT NULL,
        mitigations TEXT NOT NULL,
        monitors TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_risks_agent ON risk_factors (agent_id)",
    "CREATE TABLE IF NOT EXISTS plans (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        goal_id TEXT NOT NULL,
        description TEXT NOT NULL,
        steps TEXT NOT NULL,
        duration_est REAL NOT NULL,
        resource_requirements TEXT NOT NULL,
        success_probability REAL NOT NULL,
        contingencies TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_plans_agent ON plans (agent_id)",
    "CREATE TABLE IF NOT EXISTS sync_records (
        id TEXT PRIMARY KEY,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        direction TEXT NOT NULL,
        status TEXT NOT NULL,
        data_hash TEXT,
        timestamp TEXT NOT NULL,
        retry_count INTEGER NOT NULL,
        error TEXT,
        conflict_data TEXT,
        correlation_id TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_entity ON sync_records (entity_type, entity_id)",
    "CREATE INDEX IF NOT EXISTS idx_sync_timestamp ON sync_records (timestamp)",
    "CREATE TABLE IF NOT EXISTS sync_conflicts (
        id TEXT PRIMARY KEY,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        external_data TEXT NOT NULL,
        local_data TEXT NOT NULL,
        strategy TEXT NOT NULL,
        resolved_data TEXT,
        resolved_at TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_conflicts_entity ON sync_conflicts (entity_type, entity_id)",
    "CREATE TABLE IF NOT EXISTS sync_events (
        id TEXT PRIMARY KEY,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        correlation_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        occurred_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_events_entity ON sync_events (entity_type, entity_id)",
    "CREATE TABLE IF NOT EXISTS sync_statistics (
        id TEXT PRIMARY KEY,
        total INTEGER NOT NULL,
        success INTEGER NOT NULL,
        failure INTEGER NOT NULL,
        conflicts INTEGER NOT NULL,
        conflicts_resolved INTEGER NOT NULL,
        last_sync TEXT
    )",
    "CREATE TABLE IF NOT EXISTS strategic_analysis (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];
