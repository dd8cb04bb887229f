//! # Task Session State Machine
//!
//! Lifecycle of one (user, task) pair:
//!
//! ```text
//! ABSENT --start--> IN_PROGRESS --complete--> COMPLETED
//!                        |  ^
//!                      fail |
//!                        v  |
//!                      FAILED --start (retry)
//! ```
//!
//! The transition table is checked in-process first, but the store's atomic
//! primitives are the authority: a transition that loses a race is reported
//! as [`StateMachineError::InvalidTransition`] from the state that won.

pub mod errors;
pub mod events;
pub mod session;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::SessionEvent;
pub use session::{determine_target_state, TaskSessionMachine};
pub use states::SessionState;
