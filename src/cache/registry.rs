use super::manager::CacheManager;
use super::provider::CacheProvider;
use crate::config::CacheConfig;
use std::collections::HashMap;
use tracing::{info, warn};

/// Named cache instances, one per data class.
///
/// Each instance has its own capacity and TTL, so invalidating one class
/// never evicts another.
#[derive(Debug, Clone, Default)]
pub struct CacheRegistry {
    instances: HashMap<String, CacheManager>,
}

impl CacheRegistry {
    pub fn from_config(config: &CacheConfig) -> Self {
        let instances = config
            .instances
            .iter()
            .map(|(name, instance)| {
                let manager = CacheManager::new(
                    name.clone(),
                    CacheProvider::moka(instance.max_capacity),
                    instance.ttl(),
                );
                (name.clone(), manager)
            })
            .collect::<HashMap<_, _>>();

        info!(
            instances = instances.len(),
            "Cache registry initialized"
        );
        Self { instances }
    }

    /// Registry where every lookup yields an always-miss instance
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn register(&mut self, manager: CacheManager) {
        self.instances.insert(manager.name().to_string(), manager);
    }

    /// Instance by name; unknown names get a disabled instance
    pub fn instance(&self, name: &str) -> CacheManager {
        match self.instances.get(name) {
            Some(manager) => manager.clone(),
            None => {
                if !self.instances.is_empty() {
                    warn!(cache = name, "Unknown cache instance, caching disabled for it");
                }
                CacheManager::disabled(name)
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyPattern;
    use crate::constants::cache_instances;

    #[tokio::test]
    async fn test_default_instances_are_isolated() {
        let registry = CacheRegistry::from_config(&CacheConfig::default());
        for name in cache_instances::ALL {
            assert!(registry.names().any(|n| n == name), "missing {name}");
        }

        let aggregates = registry.instance(cache_instances::USER_AGGREGATES);
        let blogs = registry.instance(cache_instances::BLOG_LISTS);
        aggregates.set("user:1:rank", &1, None).await;
        blogs.set("user:1:featured", &"post", None).await;

        aggregates.invalidate_pattern(&KeyPattern::substring("user:1:")).await;
        assert_eq!(aggregates.get::<i64>("user:1:rank").await, None);
        assert_eq!(
            blogs.get::<String>("user:1:featured").await,
            Some("post".to_string())
        );
    }

    #[tokio::test]
    async fn test_instances_share_storage_across_handles() {
        let registry = CacheRegistry::from_config(&CacheConfig::default());
        registry
            .instance(cache_instances::NOTIFICATION_COUNTS)
            .set("unread:u1", &3, None)
            .await;
        assert_eq!(
            registry
                .instance(cache_instances::NOTIFICATION_COUNTS)
                .get::<i64>("unread:u1")
                .await,
            Some(3)
        );
    }

    #[test]
    fn test_unknown_instance_is_disabled() {
        let registry = CacheRegistry::disabled();
        assert!(!registry.instance("nope").provider().is_enabled());
    }
}
