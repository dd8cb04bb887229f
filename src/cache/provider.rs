//! Enum dispatch over the concrete cache backends

use super::errors::CacheResult;
use super::providers::{MokaCacheService, NoOpCacheService};
use super::traits::{CacheService, KeyPattern};
use std::time::Duration;

#[derive(Debug, Clone)]
enum CacheBackend {
    /// Boxed to keep the enum small
    Moka(Box<MokaCacheService>),
    NoOp(NoOpCacheService),
}

/// A cache backend chosen at construction time
#[derive(Debug, Clone)]
pub struct CacheProvider {
    backend: CacheBackend,
}

impl CacheProvider {
    /// Bounded in-memory LRU cache with per-entry TTL
    pub fn moka(max_capacity: u64) -> Self {
        Self {
            backend: CacheBackend::Moka(Box::new(MokaCacheService::new(max_capacity))),
        }
    }

    /// Always-miss provider
    pub fn noop() -> Self {
        Self {
            backend: CacheBackend::NoOp(NoOpCacheService::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.backend, CacheBackend::NoOp(_))
    }

    /// Apply pending evictions; a no-op for backends without maintenance
    pub async fn run_pending_tasks(&self) {
        if let CacheBackend::Moka(s) = &self.backend {
            s.run_pending_tasks().await;
        }
    }
}

impl CacheService for CacheProvider {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match &self.backend {
            CacheBackend::Moka(s) => s.get(key).await,
            CacheBackend::NoOp(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match &self.backend {
            CacheBackend::Moka(s) => s.set(key, value, ttl).await,
            CacheBackend::NoOp(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        match &self.backend {
            CacheBackend::Moka(s) => s.delete(key).await,
            CacheBackend::NoOp(s) => s.delete(key).await,
        }
    }

    async fn delete_pattern(&self, pattern: &KeyPattern) -> CacheResult<u64> {
        match &self.backend {
            CacheBackend::Moka(s) => s.delete_pattern(pattern).await,
            CacheBackend::NoOp(s) => s.delete_pattern(pattern).await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match &self.backend {
            CacheBackend::Moka(s) => s.health_check().await,
            CacheBackend::NoOp(s) => s.health_check().await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match &self.backend {
            CacheBackend::Moka(s) => s.provider_name(),
            CacheBackend::NoOp(s) => s.provider_name(),
        }
    }
}
