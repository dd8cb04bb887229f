//! # Task Eligibility & Reward Engine
//!
//! Root orchestrator. A request flows through:
//!
//! ```text
//! AccessGate -> RateLimiter -> TaskStore reads (catalog page via cache)
//!            -> EligibilityResolver -> RewardPolicy -> TaskSessionMachine
//!            -> EventSink
//! ```
//!
//! Only the catalog page and the earnings rank are ever served from cache.

pub mod clock;
pub mod task_engine;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use task_engine::TaskEngine;
pub use types::{
    AnnotatedTask, CompletionReceipt, Pagination, StartTaskRequest, StartTaskResponse,
    TaskListQuery, TaskListResponse, UserStats,
};
