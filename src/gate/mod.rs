//! # Collaborator seams
//!
//! Country restriction runs before the engine and notification dispatch runs
//! after it. Both are traits so the engine can be exercised without geo
//! lookups or a notification backend.

pub mod access;
pub mod sink;

pub use access::{AccessDecision, AccessGate, AllowAllGate, CountryBlocklistGate, RequestContext};
pub use sink::{
    BroadcastEventSink, CollectingEventSink, EngineEvent, EventSink, EventSinkError,
    TracingEventSink,
};
