//! # Rate Limiter
//!
//! Sliding window over a per-identifier list of request timestamps. On each
//! check, timestamps older than `now - window` are pruned; if `limit` remain
//! the request is rejected with `reset_time = oldest + window`, otherwise
//! `now` is appended and the request admitted.
//!
//! Counting state lives behind [`RateLimitStore`]. The default store is
//! process-local ([`InMemoryRateLimitStore`]); a shared store can be plugged
//! in for multi-instance deployments without touching callers.
//!
//! The limiter fails open: if the store errors, the request is allowed and the
//! failure is logged.

use crate::config::{RateLimitPreset, RateLimitsConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit store error: {0}")]
    Store(String),

    #[error("Invalid rate limit window: {0:?}")]
    InvalidWindow(Duration),
}

pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

/// Window state after a hit was applied (or refused)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub admitted: bool,
    /// Timestamps in the window after the operation
    pub count: u32,
    pub oldest: Option<DateTime<Utc>>,
}

/// Storage for per-identifier timestamp windows.
///
/// `hit` must be atomic per identifier: prune, compare and append happen as
/// one step.
#[async_trait]
pub trait RateLimitStore: Send + Sync + std::fmt::Debug {
    async fn hit(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitResult<WindowSnapshot>;

    async fn reset(&self, identifier: &str) -> RateLimitResult<()>;
}

/// Process-local store; each identifier's window is guarded by its DashMap shard
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, VecDeque<DateTime<Utc>>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_identifiers(&self) -> usize {
        self.windows.len()
    }

    /// Drop identifiers whose every timestamp has left `window`
    pub fn prune_idle(&self, window: Duration, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = window_start(window, now) else {
            return 0;
        };
        let before = self.windows.len();
        self.windows
            .retain(|_, stamps| stamps.back().is_some_and(|last| *last > cutoff));
        before - self.windows.len()
    }
}

fn window_start(window: Duration, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| now.checked_sub_signed(w))
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitResult<WindowSnapshot> {
        let cutoff = window_start(window, now).ok_or(RateLimitError::InvalidWindow(window))?;

        let mut stamps = self.windows.entry(identifier.to_string()).or_default();
        while stamps.front().is_some_and(|oldest| *oldest <= cutoff) {
            stamps.pop_front();
        }

        let admitted = (stamps.len() as u64) < u64::from(limit);
        if admitted {
            // Callers may read the clock before this shard lock; keep the window sorted
            let at = stamps.partition_point(|t| *t <= now);
            stamps.insert(at, now);
        }

        Ok(WindowSnapshot {
            admitted,
            count: u32::try_from(stamps.len()).unwrap_or(u32::MAX),
            oldest: stamps.front().copied(),
        })
    }

    async fn reset(&self, identifier: &str) -> RateLimitResult<()> {
        self.windows.remove(identifier);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    presets: RateLimitsConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, presets: RateLimitsConfig) -> Self {
        Self { store, presets }
    }

    pub fn in_memory(presets: RateLimitsConfig) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), presets)
    }

    pub fn preset(&self, name: &str) -> RateLimitPreset {
        self.presets.preset(name)
    }

    pub async fn check_limit(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
    ) -> RateLimitDecision {
        self.check_limit_at(identifier, limit, window, Utc::now()).await
    }

    /// Check against a named preset; unknown names use the `api` preset
    pub async fn check_preset(&self, preset: &str, identifier: &str) -> RateLimitDecision {
        let RateLimitPreset { limit, window_ms } = self.presets.preset(preset);
        let key = format!("{preset}:{identifier}");
        self.check_limit(&key, limit, Duration::from_millis(window_ms)).await
    }

    pub async fn check_limit_at(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let window_end = |from: DateTime<Utc>| {
            chrono::Duration::from_std(window)
                .ok()
                .and_then(|w| from.checked_add_signed(w))
                .unwrap_or(from)
        };

        match self.store.hit(identifier, limit, window, now).await {
            Ok(snapshot) => {
                let decision = RateLimitDecision {
                    success: snapshot.admitted,
                    limit,
                    remaining: limit.saturating_sub(snapshot.count),
                    reset_time: window_end(snapshot.oldest.unwrap_or(now)),
                };
                if !decision.success {
                    debug!(
                        identifier,
                        limit,
                        reset_time = %decision.reset_time,
                        "Rate limit exceeded"
                    );
                }
                decision
            }
            Err(e) => {
                warn!(
                    identifier,
                    limit,
                    error = %e,
                    "Rate limit store failed, allowing request"
                );
                RateLimitDecision {
                    success: true,
                    limit,
                    remaining: limit,
                    reset_time: window_end(now),
                }
            }
        }
    }

    pub async fn reset(&self, identifier: &str) {
        if let Err(e) = self.store.reset(identifier).await {
            warn!(identifier, error = %e, "Failed to reset rate limit window");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::rate_limit_presets;

    fn limiter() -> RateLimiter {
        RateLimiter::in_memory(RateLimitsConfig::default())
    }

    #[tokio::test]
    async fn test_sixth_call_in_window_rejected() {
        let limiter = limiter();
        let window = Duration::from_millis(1000);
        let t0 = Utc::now();

        for i in 0..5 {
            let at = t0 + chrono::Duration::milliseconds(i * 100);
            let decision = limiter.check_limit_at("ip:1", 5, window, at).await;
            assert!(decision.success, "call {i} should pass");
            assert_eq!(decision.remaining, 4 - i as u32);
        }

        let sixth = limiter
            .check_limit_at("ip:1", 5, window, t0 + chrono::Duration::milliseconds(600))
            .await;
        assert!(!sixth.success);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(sixth.reset_time, t0 + chrono::Duration::milliseconds(1000));

        let later = limiter
            .check_limit_at("ip:1", 5, window, t0 + chrono::Duration::milliseconds(1001))
            .await;
        assert!(later.success);
    }

    #[tokio::test]
    async fn test_window_slides_after_sleep() {
        let limiter = limiter();
        let window = Duration::from_millis(1000);

        for _ in 0..5 {
            assert!(limiter.check_limit("user:9", 5, window).await.success);
        }
        assert!(!limiter.check_limit("user:9", 5, window).await.success);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check_limit("user:9", 5, window).await.success);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = limiter();
        let window = Duration::from_secs(60);
        assert!(limiter.check_limit("a", 1, window).await.success);
        assert!(!limiter.check_limit("a", 1, window).await.success);
        assert!(limiter.check_limit("b", 1, window).await.success);
    }

    #[tokio::test]
    async fn test_rejected_calls_do_not_extend_window() {
        let limiter = limiter();
        let window = Duration::from_millis(1000);
        let t0 = Utc::now();

        assert!(limiter.check_limit_at("k", 1, window, t0).await.success);
        for ms in [200, 400, 800] {
            let at = t0 + chrono::Duration::milliseconds(ms);
            assert!(!limiter.check_limit_at("k", 1, window, at).await.success);
        }
        let after = t0 + chrono::Duration::milliseconds(1000);
        assert!(limiter.check_limit_at("k", 1, window, after).await.success);
    }

    #[tokio::test]
    async fn test_login_preset() {
        let limiter = limiter();
        for _ in 0..5 {
            assert!(
                limiter
                    .check_preset(rate_limit_presets::LOGIN, "10.0.0.1")
                    .await
                    .success
            );
        }
        let blocked = limiter
            .check_preset(rate_limit_presets::LOGIN, "10.0.0.1")
            .await;
        assert!(!blocked.success);
        assert_eq!(blocked.limit, 5);

        // Same identifier under another preset has its own window
        assert!(
            limiter
                .check_preset(rate_limit_presets::API, "10.0.0.1")
                .await
                .success
        );
    }

    #[tokio::test]
    async fn test_reset_clears_window() {
        let limiter = limiter();
        let window = Duration::from_secs(60);
        assert!(limiter.check_limit("r", 1, window).await.success);
        limiter.reset("r").await;
        assert!(limiter.check_limit("r", 1, window).await.success);
    }

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl RateLimitStore for BrokenStore {
        async fn hit(
            &self,
            _identifier: &str,
            _limit: u32,
            _window: Duration,
            _now: DateTime<Utc>,
        ) -> RateLimitResult<WindowSnapshot> {
            Err(RateLimitError::Store("connection refused".to_string()))
        }

        async fn reset(&self, _identifier: &str) -> RateLimitResult<()> {
            Err(RateLimitError::Store("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore), RateLimitsConfig::default());
        for _ in 0..10 {
            let decision = limiter.check_limit("x", 1, Duration::from_secs(1)).await;
            assert!(decision.success);
            assert_eq!(decision.remaining, 1);
        }
    }

    #[tokio::test]
    async fn test_out_of_order_hits_keep_window_sorted() {
        let limiter = limiter();
        let window = Duration::from_millis(1000);
        let t0 = Utc::now();
        let at = |ms| t0 + chrono::Duration::milliseconds(ms);

        assert!(limiter.check_limit_at("late", 2, window, at(500)).await.success);
        assert!(limiter.check_limit_at("late", 2, window, at(0)).await.success);

        let full = limiter.check_limit_at("late", 2, window, at(600)).await;
        assert!(!full.success);
        assert_eq!(full.reset_time, at(1000));

        let after_oldest_expires = limiter.check_limit_at("late", 2, window, at(1001)).await;
        assert!(after_oldest_expires.success);
        assert_eq!(after_oldest_expires.remaining, 0);
        assert_eq!(after_oldest_expires.reset_time, at(1500));
    }

    #[tokio::test]
    async fn test_prune_idle_uses_newest_stamp() {
        let store = InMemoryRateLimitStore::new();
        let now = Utc::now();
        let window = Duration::from_secs(10);
        store.hit("mixed", 5, window, now).await.unwrap();
        store
            .hit("mixed", 5, window, now - chrono::Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(store.prune_idle(window, now), 0);
        assert_eq!(store.tracked_identifiers(), 1);
    }

    #[tokio::test]
    async fn test_prune_idle() {
        let store = InMemoryRateLimitStore::new();
        let now = Utc::now();
        let window = Duration::from_secs(10);
        store
            .hit("old", 5, window, now - chrono::Duration::seconds(30))
            .await
            .unwrap();
        store.hit("fresh", 5, window, now).await.unwrap();
        assert_eq!(store.prune_idle(window, now), 1);
        assert_eq!(store.tracked_identifiers(), 1);
    }
}
