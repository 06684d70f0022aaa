//! Environment configuration (spec §6).

use std::env;

use crate::error::{StoreError, StoreResult};

/// Deployment environment gate. `Production` forbids fallback paths (spec §6, §7 ConfigurationError).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Any value other than `production`; degraded fallbacks are permitted with a logged warning.
    Development,
    /// Fallback paths must raise `ConfigurationError` instead of silently degrading.
    Production,
}

impl Environment {
    /// Reads `ENVIRONMENT`, defaulting to `Development`.
    #[must_use]
    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT") {
            Ok(value) if value.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }

    /// Whether fallback/degraded paths are allowed.
    #[must_use]
    pub fn allows_fallback(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Selects which relational backend `PersistentStore` connects to.
#[derive(Debug, Clone)]
pub enum BackendTarget {
    /// Embedded single-file engine (SQLite) for single-process runs.
    Embedded {
        /// Path to the database file.
        path: String,
    },
    /// Networked engine with a connection pool, tried in order on failover.
    Networked {
        /// Candidate DSNs, tried in order.
        dsns: Vec<String>,
        /// Pool size.
        pool_size: u32,
    },
}

/// Redis endpoint configuration for the advisory lock / event cache.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis host.
    pub host: String,
    /// Redis port.
    pub port: u16,
}

/// Fully parsed store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Which backend to connect to.
    pub backend: BackendTarget,
    /// Redis config, if the distributed advisory lock is enabled.
    pub redis: Option<RedisConfig>,
    /// Deployment environment.
    pub environment: Environment,
}

impl StoreConfig {
    /// Parses configuration from the process environment (spec §6).
    ///
    /// # Errors
    /// Returns [`StoreError::Configuration`] if `POSTGRES_POOL_SIZE` is set but not a valid
    /// positive integer.
    pub fn from_env() -> StoreResult<Self> {
        let backend = if let Ok(urls) = env::var("POSTGRESQL_URLS") {
            Self::networked_from_list(&urls)?
        } else if let Ok(url) = env::var("POSTGRESQL_URL") {
            Self::networked_from_list(&url)?
        } else if let Ok(dsn) = env::var("POSTGRES_DSN") {
            Self::networked_from_list(&dsn)?
        } else {
            BackendTarget::Embedded {
                path: env::var("FOLIO_SQLITE_PATH").unwrap_or_else(|_| "folio.db".to_string()),
            }
        };

        let redis = match (env::var("REDIS_HOST"), env::var("REDIS_PORT")) {
            (Ok(host), Ok(port_str)) => {
                let port = port_str
                    .parse()
                    .map_err(|_| StoreError::Configuration(format!("invalid REDIS_PORT: {port_str}")))?;
                Some(RedisConfig { host, port })
            }
            (Ok(host), Err(_)) => Some(RedisConfig { host, port: 6379 }),
            _ => None,
        };

        Ok(Self {
            backend,
            redis,
            environment: Environment::from_env(),
        })
    }

    fn networked_from_list(raw: &str) -> StoreResult<BackendTarget> {
        let dsns: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
        if dsns.is_empty() {
            return Err(StoreError::Configuration(
                "POSTGRES DSN env var set but empty".into(),
            ));
        }
        let pool_size = match env::var("POSTGRES_POOL_SIZE") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| StoreError::Configuration(format!("invalid POSTGRES_POOL_SIZE: {raw}")))?,
            Err(_) => 5,
        };
        Ok(BackendTarget::Networked { dsns, pool_size })
    }

    /// An in-memory embedded config, useful for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            backend: BackendTarget::Embedded {
                path: ":memory:".to_string(),
            },
            redis: None,
            environment: Environment::Development,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn networked_from_list_splits_failover_dsns() {
        let target = StoreConfig::networked_from_list("postgres://a,postgres://b").unwrap();
        match target {
            BackendTarget::Networked { dsns, pool_size } => {
                assert_eq!(dsns, vec!["postgres://a", "postgres://b"]);
                assert_eq!(pool_size, 5);
            }
            BackendTarget::Embedded { .. } => panic!("expected networked target"),
        }
    }

    #[test]
    fn environment_defaults_to_development() {
        assert!(Environment::Development.allows_fallback());
        assert!(!Environment::Production.allows_fallback());
    }
}
