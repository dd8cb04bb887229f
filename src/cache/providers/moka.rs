//! In-memory cache provider using Moka
//!
//! Bounded capacity with LRU eviction and a TTL carried by each entry. Reads
//! refresh an entry's recency but never its expiry.
//!
//! **Important**: this cache is process-local. Replicas each hold their own
//! copy, so invalidation on one instance does not reach the others.

use crate::cache::errors::CacheResult;
use crate::cache::traits::{CacheService, KeyPattern};
use moka::policy::EvictionPolicy;
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedValue {
    value: String,
    ttl: Duration,
}

/// Expiry driven by the TTL stored with each value
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Clone)]
pub struct MokaCacheService {
    cache: moka::future::Cache<String, CachedValue>,
    max_capacity: u64,
}

impl std::fmt::Debug for MokaCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaCacheService")
            .field("max_capacity", &self.max_capacity)
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MokaCacheService {
    pub fn new(max_capacity: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(PerEntryTtl)
            .build();

        debug!(max_capacity, "Moka in-memory cache service created");

        Self {
            cache,
            max_capacity,
        }
    }

    /// Apply pending evictions and expirations
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl CacheService for MokaCacheService {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let result = self.cache.get(key).await.map(|entry| entry.value);

        if result.is_some() {
            debug!(key = key, "Cache HIT (moka)");
        } else {
            debug!(key = key, "Cache MISS (moka)");
        }

        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.cache
            .insert(
                key.to_string(),
                CachedValue {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;

        debug!(key = key, ttl_ms = ttl.as_millis() as u64, "Cache SET (moka)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        debug!(key = key, "Cache DEL (moka)");
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &KeyPattern) -> CacheResult<u64> {
        // Linear scan; capacities are capped small enough for this to be cheap
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| pattern.matches(key.as_str()))
            .map(|(key, _)| String::clone(&key))
            .collect();

        for key in &matching {
            self.cache.invalidate(key).await;
        }

        debug!(
            pattern = pattern.as_str(),
            removed = matching.len(),
            "Cache DEL pattern (moka)"
        );
        Ok(matching.len() as u64)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "moka"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_moka_set_and_get() {
        let svc = MokaCacheService::new(100);
        svc.set("k", r#"{"n":1}"#, Duration::from_secs(60)).await.unwrap();
        assert_eq!(svc.get("k").await.unwrap(), Some(r#"{"n":1}"#.to_string()));
        assert_eq!(svc.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_moka_delete() {
        let svc = MokaCacheService::new(100);
        svc.set("to_delete", "v", Duration::from_secs(60)).await.unwrap();
        svc.delete("to_delete").await.unwrap();
        assert!(svc.get("to_delete").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lru_evicts_least_recently_used() {
        let svc = MokaCacheService::new(2);
        let ttl = Duration::from_secs(60);

        svc.set("a", "1", ttl).await.unwrap();
        svc.set("b", "2", ttl).await.unwrap();
        svc.run_pending_tasks().await;

        // Touch "a" so "b" becomes least recently used
        assert!(svc.get("a").await.unwrap().is_some());
        svc.run_pending_tasks().await;

        svc.set("c", "3", ttl).await.unwrap();
        svc.run_pending_tasks().await;

        assert_eq!(svc.entry_count(), 2);
        assert!(svc.get("b").await.unwrap().is_none());
        assert!(svc.get("a").await.unwrap().is_some());
        assert!(svc.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_read_does_not_extend_ttl() {
        let svc = MokaCacheService::new(100);
        svc.set("expiring", "v", Duration::from_millis(200)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(svc.get("expiring").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(svc.get("expiring").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_per_entry_ttl() {
        let svc = MokaCacheService::new(100);
        svc.set("short", "v", Duration::from_millis(50)).await.unwrap();
        svc.set("long", "v", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(svc.get("short").await.unwrap().is_none());
        assert!(svc.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let svc = MokaCacheService::new(100);
        svc.set("k", "old", Duration::from_millis(100)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        svc.set("k", "new", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(svc.get("k").await.unwrap(), Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_delete_pattern_removes_only_matches() {
        let svc = MokaCacheService::new(100);
        let ttl = Duration::from_secs(60);
        svc.set("user:1:rank", "3", ttl).await.unwrap();
        svc.set("user:1:stats", "{}", ttl).await.unwrap();
        svc.set("user:2:rank", "1", ttl).await.unwrap();

        let removed = svc
            .delete_pattern(&KeyPattern::substring("user:1:"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(svc.get("user:1:rank").await.unwrap().is_none());
        assert!(svc.get("user:2:rank").await.unwrap().is_some());

        let removed = svc
            .delete_pattern(&KeyPattern::regex(r"^user:\d+:rank$").unwrap())
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_moka_debug_format() {
        let svc = MokaCacheService::new(10);
        let debug_str = format!("{svc:?}");
        assert!(debug_str.contains("MokaCacheService"));
        assert!(debug_str.contains("max_capacity"));
    }
}
