//! Engine events and the sinks that receive them.
//!
//! Events are emitted after the state change they describe has committed. A
//! failing sink is logged and never rolls the change back.

use crate::constants::events;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    TaskStarted {
        user_id: Uuid,
        task_id: Uuid,
        completion_id: Uuid,
        at: DateTime<Utc>,
    },
    TaskProgressed {
        user_id: Uuid,
        task_id: Uuid,
        progress: i32,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        user_id: Uuid,
        task_id: Uuid,
        reward: i64,
        at: DateTime<Utc>,
    },
    TaskFailed {
        user_id: Uuid,
        task_id: Uuid,
        at: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskStarted { .. } => events::TASK_STARTED,
            Self::TaskProgressed { .. } => events::TASK_PROGRESSED,
            Self::TaskCompleted { .. } => events::TASK_COMPLETED,
            Self::TaskFailed { .. } => events::TASK_FAILED,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            Self::TaskStarted { user_id, .. }
            | Self::TaskProgressed { user_id, .. }
            | Self::TaskCompleted { user_id, .. }
            | Self::TaskFailed { user_id, .. } => *user_id,
        }
    }

    pub fn task_id(&self) -> Uuid {
        match self {
            Self::TaskStarted { task_id, .. }
            | Self::TaskProgressed { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. } => *task_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventSinkError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Event delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait EventSink: Send + Sync + std::fmt::Debug {
    async fn emit(&self, event: EngineEvent) -> Result<(), EventSinkError>;
}

/// Writes each event as a structured log record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: EngineEvent) -> Result<(), EventSinkError> {
        info!(
            event = event.name(),
            user_id = %event.user_id(),
            task_id = %event.task_id(),
            "Engine event"
        );
        Ok(())
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(EngineEvent::name).collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: EngineEvent) -> Result<(), EventSinkError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Fan-out to in-process subscribers such as a notification dispatcher
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EngineEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn emit(&self, event: EngineEvent) -> Result<(), EventSinkError> {
        // No subscribers is not an error
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> EngineEvent {
        EngineEvent::TaskStarted {
            user_id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            completion_id: Uuid::new_v4(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_collecting_sink_records_in_order() {
        let sink = CollectingEventSink::new();
        sink.emit(started()).await.unwrap();
        let event = EngineEvent::TaskFailed {
            user_id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            at: Utc::now(),
        };
        sink.emit(event).await.unwrap();
        assert_eq!(sink.names(), vec![events::TASK_STARTED, events::TASK_FAILED]);
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers_to_subscribers() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();
        let event = started();
        sink.emit(event.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let sink = BroadcastEventSink::default();
        assert_eq!(sink.subscriber_count(), 0);
        assert!(sink.emit(started()).await.is_ok());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(started()).unwrap();
        assert_eq!(json["event"], "task_started");
    }
}
