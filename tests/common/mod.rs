//! Shared fixtures for engine integration tests.
//!
//! Every harness runs the full engine over [`InMemoryTaskStore`] with a fixed
//! clock, a collecting event sink and no access gate.

#![allow(dead_code)]

pub mod builders;

pub use builders::*;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::sync::Arc;
use task_rewards::config::EngineConfig;
use task_rewards::engine::{FixedClock, TaskEngine};
use task_rewards::gate::{AllowAllGate, CollectingEventSink, RequestContext};
use task_rewards::persistence::InMemoryTaskStore;
use task_rewards::reward::StaticRewardOverride;
use uuid::Uuid;

/// Wednesday 2025-03-12 10:00 UTC
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 12, 10, 0, 0).unwrap()
}

pub struct TestHarness {
    pub engine: TaskEngine,
    pub store: Arc<InMemoryTaskStore>,
    pub clock: Arc<FixedClock>,
    pub events: Arc<CollectingEventSink>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_override(None)
    }

    pub fn with_override(amount: Option<i64>) -> Self {
        Self::build(EngineConfig::default(), amount)
    }

    pub fn build(config: EngineConfig, amount: Option<i64>) -> Self {
        let store = Arc::new(InMemoryTaskStore::new());
        let clock = Arc::new(FixedClock::new(
            base_time(),
            FixedOffset::east_opt(0).unwrap(),
        ));
        let events = Arc::new(CollectingEventSink::new());

        let engine = TaskEngine::new(store.clone(), config)
            .with_gate(Arc::new(AllowAllGate))
            .with_event_sink(events.clone())
            .with_reward_override(Arc::new(StaticRewardOverride(amount)))
            .with_clock(clock.clone());

        Self {
            engine,
            store,
            clock,
            events,
        }
    }

    pub fn ctx(&self, user_id: Uuid) -> RequestContext {
        RequestContext::for_user(user_id)
    }

    /// Start then complete `task_id`, returning the credited reward
    pub async fn start_and_complete(&self, user_id: Uuid, task_id: Uuid) -> i64 {
        let ctx = self.ctx(user_id);
        self.engine.start_task(&ctx, task_id).await.unwrap();
        self.engine
            .complete_task(&ctx, task_id)
            .await
            .unwrap()
            .reward
    }
}
