//! # Persistence Collaborator
//!
//! The engine never talks to a database directly. Everything it reads or
//! writes goes through [`TaskStore`], whose implementations must provide two
//! primitives atomically:
//!
//! - **Upsert by unique key** on `(user_id, task_id)` for session start, so a
//!   concurrent duplicate start cannot create two IN_PROGRESS rows
//! - **Status flip plus counter increment** as one unit on completion, so a
//!   retried completion cannot pay twice
//!
//! [`PgTaskStore`] is the production implementation; [`InMemoryTaskStore`]
//! provides the same guarantees under a single lock for tests and embedding.

pub mod memory;
pub mod postgres;

use crate::models::{
    MembershipPlan, ReferralSnapshot, Task, TaskCompletion, TaskFilter, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;

/// Errors surfaced by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint {constraint} violated for {key}")]
    UniqueViolation { constraint: String, key: String },

    #[error("Invalid value '{value}' in column {column}")]
    CorruptRow { column: String, value: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

const UNIQUE_VIOLATION_SQLSTATE: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION_SQLSTATE) {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    key: db_err.message().to_string(),
                };
            }
        }
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of the task catalog
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: u64,
}

/// Result of the atomic start upsert
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// Row created, or a FAILED row reset to IN_PROGRESS
    Started(TaskCompletion),
    /// A non-FAILED row already existed and was left untouched
    AlreadyActive(TaskCompletion),
}

/// Records and atomic operations the engine depends on
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    async fn find_plan_by_name(&self, name: &str) -> StoreResult<Option<MembershipPlan>>;

    /// Direct referrals of `sponsor_id`, read fresh on every call
    async fn list_referrals(&self, sponsor_id: Uuid) -> StoreResult<Vec<ReferralSnapshot>>;

    async fn find_task(&self, task_id: Uuid) -> StoreResult<Option<Task>>;

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<TaskPage>;

    async fn find_completion(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskCompletion>>;

    async fn list_completions(
        &self,
        user_id: Uuid,
        task_ids: &[Uuid],
    ) -> StoreResult<Vec<TaskCompletion>>;

    /// COMPLETED sessions with `completed_at >= since`
    async fn count_completions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// 1 + number of users with strictly greater total earnings
    async fn earnings_rank(&self, user_id: Uuid) -> StoreResult<i64>;

    /// Insert an IN_PROGRESS row, or reset a FAILED one, and bump `Task.attempts`
    async fn start_session(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> StoreResult<StartOutcome>;

    /// Update progress of an IN_PROGRESS row; `None` if no such row
    async fn update_progress(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        progress: i32,
    ) -> StoreResult<Option<TaskCompletion>>;

    /// Flip IN_PROGRESS to COMPLETED and credit `reward` to the user in one unit.
    /// `None` if the row was not IN_PROGRESS, in which case nothing is credited.
    async fn complete_and_credit(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        reward: i64,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<Option<TaskCompletion>>;

    /// Flip IN_PROGRESS to FAILED; `None` if the row was not IN_PROGRESS
    async fn mark_failed(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskCompletion>>;
}
