//! Optional low-latency KV cache backing advisory locks (spec §4.1, §4.7).
//!
//! Correctness never depends on this being present: callers fall back to
//! in-process guards when `KvCache::is_available` is false.

use async_trait::async_trait;

use crate::error::StoreResult;

/// A minimal KV surface sufficient for advisory locks and small caches.
#[async_trait]
pub trait KvCache: Send + Sync {
    /// Whether a real backing store is configured.
    fn is_available(&self) -> bool;

    /// Sets `key` to `value` with a TTL, only if it does not already exist.
    /// Returns `true` if the key was set (lock acquired).
    async fn set_nx(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool>;

    /// Returns the current value of `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Deletes `key` only if its current value equals `token` (compare-and-delete),
    /// preventing a holder from releasing a lock it no longer owns.
    async fn delete_if_matches(&self, key: &str, token: &str) -> StoreResult<bool>;
}

/// No-op cache used when `REDIS_HOST`/`REDIS_PORT` are unset; the system still
/// functions via in-process guards, degraded per spec §4.7.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl KvCache for NoopCache {
    fn is_available(&self) -> bool {
        false
    }

    async fn set_nx(&self, _key: &str, _value: &str, _ttl_secs: u64) -> StoreResult<bool> {
        Ok(false)
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn delete_if_matches(&self, _key: &str, _token: &str) -> StoreResult<bool> {
        Ok(false)
    }
}

#[cfg(feature = "redis-cache")]
mod redis_impl {
    use redis::AsyncCommands;

    use super::KvCache;
    use crate::config::RedisConfig;
    use crate::error::{StoreError, StoreResult};

    /// Redis-backed implementation of [`KvCache`].
    #[derive(Clone)]
    pub struct RedisCache {
        manager: redis::aio::ConnectionManager,
    }

    impl RedisCache {
        /// Connects to the configured Redis endpoint.
        pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
            let url = format!("redis://{}:{}", config.host, config.port);
            let client = redis::Client::open(url).map_err(|e| StoreError::Configuration(e.to_string()))?;
            let manager = client
                .get_connection_manager()
                .await
                .map_err(|e| StoreError::Transient(e.to_string()))?;
            Ok(Self { manager })
        }
    }

    #[async_trait::async_trait]
    impl KvCache for RedisCache {
        fn is_available(&self) -> bool {
            true
        }

        async fn set_nx(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<bool> {
            let mut conn = self.manager.clone();
            let result: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Transient(e.to_string()))?;
            Ok(result.is_some())
        }

        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            let mut conn = self.manager.clone();
            conn.get(key)
                .await
                .map_err(|e| StoreError::Transient(e.to_string()))
        }

        async fn delete_if_matches(&self, key: &str, token: &str) -> StoreResult<bool> {
            const SCRIPT: &str = r"
                if redis.call('get', KEYS[1]) == ARGV[1] then
                    return redis.call('del', KEYS[1])
                else
                    return 0
                end
            ";
            let mut conn = self.manager.clone();
            let deleted: i64 = redis::Script::new(SCRIPT)
                .key(key)
                .arg(token)
                .invoke_async(&mut conn)
                .await
                .map_err(|e| StoreError::Transient(e.to_string()))?;
            Ok(deleted == 1)
        }
    }
}

#[cfg(feature = "redis-cache")]
pub use redis_impl::RedisCache;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_cache_never_acquires() {
        let cache = NoopCache;
        assert!(!cache.is_available());
        assert!(!cache.set_nx("k", "v", 60).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
