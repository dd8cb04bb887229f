//! # Engine Configuration
//!
//! Layered configuration for the reward engine. Defaults mirror the values in
//! [`crate::constants`]; an optional TOML file and `TASK_REWARDS__*` environment
//! variables override them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use task_rewards::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(Some("config/task-rewards.toml"))?;
//! let api = manager.config().rate_limits.preset("api");
//! println!("api preset: {:?}", api);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{
    cache_instances, rate_limit_presets, FALLBACK_REWARD, MAX_CACHE_CAPACITY,
    TASK_AMOUNT_OVERRIDE_VAR, TRIAL_DAYS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rewards: RewardsConfig,
    pub eligibility: EligibilityConfig,
    pub rate_limits: RateLimitsConfig,
    pub cache: CacheConfig,
    pub access: AccessConfig,
    pub listing: ListingConfig,
    pub database: DatabaseConfig,
    pub web: WebConfig,
}

/// Reward calculation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardsConfig {
    /// Reward used when neither an override nor a persisted plan applies
    pub fallback_amount: i64,
    /// Environment variable consulted on every request for the flat override
    pub override_env_var: String,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            fallback_amount: FALLBACK_REWARD,
            override_env_var: TASK_AMOUNT_OVERRIDE_VAR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EligibilityConfig {
    pub trial_days: i64,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            trial_days: TRIAL_DAYS,
        }
    }
}

/// A single sliding-window rate limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitPreset {
    pub limit: u32,
    pub window_ms: u64,
}

impl RateLimitPreset {
    pub const fn new(limit: u32, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Named rate-limit presets
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitsConfig {
    pub presets: HashMap<String, RateLimitPreset>,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        let presets = HashMap::from([
            (
                rate_limit_presets::LOGIN.to_string(),
                RateLimitPreset::new(5, 15 * 60 * 1000),
            ),
            (
                rate_limit_presets::API.to_string(),
                RateLimitPreset::new(100, 60 * 60 * 1000),
            ),
        ]);
        Self { presets }
    }
}

impl RateLimitsConfig {
    /// Look up a preset, falling back to the `api` preset for unknown names
    pub fn preset(&self, name: &str) -> RateLimitPreset {
        self.presets
            .get(name)
            .or_else(|| self.presets.get(rate_limit_presets::API))
            .copied()
            .unwrap_or(RateLimitPreset::new(100, 60 * 60 * 1000))
    }
}

/// Capacity and TTL of one named cache instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheInstanceConfig {
    pub max_capacity: u64,
    pub ttl_seconds: u64,
}

impl CacheInstanceConfig {
    pub const fn new(max_capacity: u64, ttl_seconds: u64) -> Self {
        Self {
            max_capacity,
            ttl_seconds,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub instances: HashMap<String, CacheInstanceConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let instances = HashMap::from([
            (
                cache_instances::USER_AGGREGATES.to_string(),
                CacheInstanceConfig::new(1000, 300),
            ),
            (
                cache_instances::TASK_CATALOG.to_string(),
                CacheInstanceConfig::new(200, 60),
            ),
            (
                cache_instances::BLOG_LISTS.to_string(),
                CacheInstanceConfig::new(100, 600),
            ),
            (
                cache_instances::NOTIFICATION_COUNTS.to_string(),
                CacheInstanceConfig::new(1000, 30),
            ),
            (
                cache_instances::MLM_ROLLUPS.to_string(),
                CacheInstanceConfig::new(500, 300),
            ),
        ]);
        Self { instances }
    }
}

/// Country restriction settings consumed by the access gate
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    pub blocked_countries: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/task_rewards_development".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl EngineConfig {
    /// Validate cross-field constraints after loading
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rewards.fallback_amount <= 0 {
            return Err(ConfigurationError::invalid_value(
                "rewards.fallback_amount",
                self.rewards.fallback_amount.to_string(),
                "fallback reward must be positive",
            ));
        }

        if self.eligibility.trial_days < 0 {
            return Err(ConfigurationError::invalid_value(
                "eligibility.trial_days",
                self.eligibility.trial_days.to_string(),
                "trial length cannot be negative",
            ));
        }

        if !self.rate_limits.presets.contains_key(rate_limit_presets::API) {
            return Err(ConfigurationError::missing_required_field(
                rate_limit_presets::API,
                "rate_limits.presets",
            ));
        }

        for (name, preset) in &self.rate_limits.presets {
            if preset.limit == 0 || preset.window_ms == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("rate_limits.presets.{name}"),
                    format!("{}/{}ms", preset.limit, preset.window_ms),
                    "limit and window must both be non-zero",
                ));
            }
        }

        for (name, instance) in &self.cache.instances {
            if instance.max_capacity == 0 || instance.max_capacity > MAX_CACHE_CAPACITY {
                return Err(ConfigurationError::invalid_value(
                    format!("cache.instances.{name}.max_capacity"),
                    instance.max_capacity.to_string(),
                    format!("capacity must be within 1..={MAX_CACHE_CAPACITY}"),
                ));
            }
        }

        if self.listing.default_page_size == 0
            || self.listing.default_page_size > self.listing.max_page_size
        {
            return Err(ConfigurationError::invalid_value(
                "listing.default_page_size",
                self.listing.default_page_size.to_string(),
                "default page size must be within 1..=max_page_size",
            ));
        }

        Ok(())
    }
}
