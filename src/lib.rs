#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Task Rewards Core
//!
//! Task eligibility and reward engine for an earn-by-task membership platform.
//!
//! ## Overview
//!
//! Members browse a catalog of tasks, start them, and are credited a reward on
//! completion. The engine decides, per request:
//!
//! - **Eligibility**: a member may earn during a trial window after joining;
//!   afterwards a qualifying referral (per the sponsor's plan tier) is required.
//! - **Quota**: at most `tasksPerDay` starts per local calendar day.
//! - **Reward**: a global override, else the plan's daily earning split across
//!   its daily task quota, else a fixed fallback.
//! - **Idempotency**: one session per (user, task); a completion pays once.
//!
//! Two generic services back it: a sliding-window [`rate_limiter`] and a
//! named-instance TTL/LRU [`cache`].
//!
//! ## Module Organization
//!
//! - [`engine`] - `TaskEngine` root operations and the `Clock` abstraction
//! - [`eligibility`] - trial window and referral tier rules
//! - [`reward`] - reward policy and override sources
//! - [`state_machine`] - per (user, task) session lifecycle
//! - [`persistence`] - `TaskStore` trait with Postgres and in-memory stores
//! - [`rate_limiter`] - sliding-window limiter with presets
//! - [`cache`] - Moka-backed cache instances
//! - [`gate`] - access gate and event sink collaborators
//! - [`web`] - axum HTTP surface
//! - [`config`] - layered configuration
//! - [`error`] - structured error codes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use task_rewards::config::EngineConfig;
//! use task_rewards::engine::TaskEngine;
//! use task_rewards::gate::RequestContext;
//! use task_rewards::persistence::InMemoryTaskStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryTaskStore::new());
//! let engine = TaskEngine::new(store, EngineConfig::default());
//!
//! let ctx = RequestContext::for_user(uuid::Uuid::new_v4());
//! let page = engine.list_tasks(&ctx, &Default::default()).await?;
//! println!("{} tasks available", page.pagination.total);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod gate;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod rate_limiter;
pub mod reward;
pub mod state_machine;
pub mod web;

pub use config::{ConfigManager, EngineConfig};
pub use eligibility::{EligibilityDecision, EligibilityReason, EligibilityResolver};
pub use engine::{Clock, FixedClock, SystemClock, TaskEngine};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use persistence::{InMemoryTaskStore, PgTaskStore, TaskStore};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use reward::{compute_reward, RewardPolicy};
