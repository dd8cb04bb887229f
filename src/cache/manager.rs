//! Typed, failure-tolerant access to one named cache instance.
//!
//! Values are stored as JSON. Any cache error (backend or serialization) is
//! logged at `warn` and reported as a miss, so callers always fall through to
//! the source of truth.

use super::errors::CacheError;
use super::provider::CacheProvider;
use super::traits::{CacheService, KeyPattern};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CacheManager {
    name: String,
    provider: CacheProvider,
    default_ttl: Duration,
}

impl CacheManager {
    pub fn new(name: impl Into<String>, provider: CacheProvider, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            provider,
            default_ttl,
        }
    }

    pub fn disabled(name: impl Into<String>) -> Self {
        Self::new(name, CacheProvider::noop(), Duration::ZERO)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn provider(&self) -> &CacheProvider {
        &self.provider
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.provider.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                self.log_failure("get", key, &e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                self.log_failure("get", key, &e.into());
                None
            }
        }
    }

    /// Store `value`; `ttl` defaults to the instance TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                self.log_failure("set", key, &e.into());
                return;
            }
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(e) = self.provider.set(key, &raw, ttl).await {
            self.log_failure("set", key, &e);
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.provider.delete(key).await {
            self.log_failure("delete", key, &e);
        }
    }

    /// Remove all keys matching `pattern`; returns how many were removed
    pub async fn invalidate_pattern(&self, pattern: &KeyPattern) -> u64 {
        match self.provider.delete_pattern(pattern).await {
            Ok(removed) => removed,
            Err(e) => {
                self.log_failure("invalidate_pattern", pattern.as_str(), &e);
                0
            }
        }
    }

    /// Read-through: return the cached value, or compute, store and return it.
    ///
    /// Errors from `compute` are returned untouched and nothing is cached.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        let value = compute().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    fn log_failure(&self, operation: &str, key: &str, error: &CacheError) {
        warn!(
            cache = %self.name,
            provider = self.provider.provider_name(),
            operation,
            key,
            error = %error,
            "Cache operation failed, treating as miss"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rollup {
        downline: u32,
        volume: i64,
    }

    fn manager() -> CacheManager {
        CacheManager::new("mlm_rollups", CacheProvider::moka(10), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let cache = manager();
        let value = Rollup { downline: 4, volume: 900 };
        cache.set("rollup:u1", &value, None).await;
        assert_eq!(cache.get::<Rollup>("rollup:u1").await, Some(value));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let cache = manager();
        cache.set("rollup:u1", &"not a rollup", None).await;
        assert_eq!(cache.get::<Rollup>("rollup:u1").await, None);
    }

    #[tokio::test]
    async fn test_get_or_set_computes_once() {
        let cache = manager();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value: Result<i64, String> = cache
                .get_or_set("user:1:rank", None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_set_does_not_cache_errors() {
        let cache = manager();
        let failed: Result<i64, String> = cache
            .get_or_set("user:1:rank", None, || async { Err("db down".to_string()) })
            .await;
        assert!(failed.is_err());
        assert_eq!(cache.get::<i64>("user:1:rank").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let cache = manager();
        cache.set("user:1:rank", &3, None).await;
        cache.set("user:1:week", &9, None).await;
        cache.set("user:2:rank", &1, None).await;

        let removed = cache.invalidate_pattern(&KeyPattern::substring("user:1:")).await;
        assert_eq!(removed, 2);
        assert_eq!(cache.get::<i64>("user:2:rank").await, Some(1));
    }

    #[tokio::test]
    async fn test_disabled_always_computes() {
        let cache = CacheManager::disabled("blog_lists");
        cache.set("k", &1, None).await;
        assert_eq!(cache.get::<i64>("k").await, None);
        assert!(!cache.provider().is_enabled());
    }
}
