//! No-op cache provider
//!
//! Always misses. Used for instances that are configured off and in tests
//! that must exercise the source of truth on every read.

use crate::cache::errors::CacheResult;
use crate::cache::traits::{CacheService, KeyPattern};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct NoOpCacheService;

impl NoOpCacheService {
    pub fn new() -> Self {
        Self
    }
}

impl CacheService for NoOpCacheService {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn delete_pattern(&self, _pattern: &KeyPattern) -> CacheResult<u64> {
        Ok(0)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_never_hits() {
        let svc = NoOpCacheService::new();
        svc.set("key", "value", Duration::from_secs(60)).await.unwrap();
        assert_eq!(svc.get("key").await.unwrap(), None);
        assert_eq!(
            svc.delete_pattern(&KeyPattern::substring("k")).await.unwrap(),
            0
        );
        assert_eq!(svc.provider_name(), "noop");
    }
}
