//! Cache service trait and key patterns

use super::errors::{CacheError, CacheResult};
use regex::Regex;
use std::time::Duration;

/// Selects keys for bulk invalidation
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Key contains the string
    Substring(String),
    /// Key matches the regular expression
    Regex(Regex),
}

impl KeyPattern {
    pub fn substring(pattern: impl Into<String>) -> Self {
        Self::Substring(pattern.into())
    }

    pub fn regex(pattern: &str) -> CacheResult<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| CacheError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Substring(needle) => key.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(key),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Substring(needle) => needle,
            Self::Regex(re) => re.as_str(),
        }
    }
}

/// Trait defining cache operations
///
/// Values are opaque strings; typed access lives in
/// [`CacheManager`](super::CacheManager).
pub trait CacheService: Send + Sync {
    /// `Ok(Some(value))` on hit, `Ok(None)` on miss or expiry
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Insert or overwrite with a per-entry TTL, resetting any previous expiry
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    fn delete(&self, key: &str) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Remove every key matching `pattern`; returns the number removed
    fn delete_pattern(
        &self,
        pattern: &KeyPattern,
    ) -> impl std::future::Future<Output = CacheResult<u64>> + Send;

    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_pattern() {
        let pattern = KeyPattern::substring("user:42:");
        assert!(pattern.matches("user:42:rank"));
        assert!(!pattern.matches("user:420:rank"));
    }

    #[test]
    fn test_regex_pattern() {
        let pattern = KeyPattern::regex(r"^blog:page:\d+$").unwrap();
        assert!(pattern.matches("blog:page:3"));
        assert!(!pattern.matches("blog:page:three"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        assert!(matches!(
            KeyPattern::regex("user:("),
            Err(CacheError::InvalidPattern { .. })
        ));
    }
}
