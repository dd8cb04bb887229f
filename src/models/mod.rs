//! # Data Model
//!
//! Records the engine reads and writes through the [`crate::persistence::TaskStore`]
//! collaborator. Column types are the store's concern; these structs carry the
//! fields the engine's decisions depend on.

pub mod membership_plan;
pub mod task;
pub mod task_completion;
pub mod user;

pub use membership_plan::MembershipPlan;
pub use task::{Task, TaskFilter, TaskStatus};
pub use task_completion::{CompletionStatus, TaskCompletion};
pub use user::{MembershipStatus, ReferralSnapshot, User};
