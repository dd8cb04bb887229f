//! Error types for the reward engine.
//!
//! Every domain rejection is a typed variant carrying the data the caller
//! needs to react (the eligibility reason, the daily quota, the current
//! session status). Only `Internal` represents an unexpected failure.

use crate::config::ConfigurationError;
use crate::eligibility::EligibilityReason;
use crate::models::CompletionStatus;
use crate::persistence::StoreError;
use crate::state_machine::StateMachineError;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Structured error codes surfaced to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    UserNotFound,
    RecordNotFound,
    NotEligible,
    DailyLimitReached,
    TaskAlreadyStarted,
    DuplicateCompletion,
    AccessBlocked,
    RateLimited,
    InvalidTransition,
    ValidationError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::NotEligible => "NOT_ELIGIBLE",
            Self::DailyLimitReached => "DAILY_LIMIT_REACHED",
            Self::TaskAlreadyStarted => "TASK_ALREADY_STARTED",
            Self::DuplicateCompletion => "DUPLICATE_COMPLETION",
            Self::AccessBlocked => "ACCESS_BLOCKED",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status used when the code is surfaced over the API
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::UserNotFound | Self::RecordNotFound => 404,
            Self::NotEligible | Self::AccessBlocked => 403,
            Self::DailyLimitReached | Self::RateLimited => 429,
            Self::TaskAlreadyStarted | Self::DuplicateCompletion | Self::ValidationError => 400,
            Self::InvalidTransition => 409,
            Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("User {user_id} not found")]
    UserNotFound { user_id: String },

    #[error("{entity} {id} not found")]
    RecordNotFound { entity: String, id: String },

    #[error("Not eligible for tasks: {reason}")]
    NotEligible { reason: EligibilityReason },

    #[error("Daily task limit of {tasks_per_day} reached, resets at {resets_at}")]
    DailyLimitReached {
        tasks_per_day: i32,
        resets_at: DateTime<FixedOffset>,
    },

    #[error("Task already started (status: {task_status})")]
    TaskAlreadyStarted { task_status: CompletionStatus },

    #[error("Concurrent start detected for task {task_id}")]
    DuplicateCompletion { task_id: String },

    #[error("Access blocked: {reason}")]
    AccessBlocked { reason: String },

    #[error("Rate limit exceeded, retry after {reset_time}")]
    RateLimited {
        limit: u32,
        reset_time: DateTime<Utc>,
    },

    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::UserNotFound { .. } => ErrorCode::UserNotFound,
            Self::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Self::NotEligible { .. } => ErrorCode::NotEligible,
            Self::DailyLimitReached { .. } => ErrorCode::DailyLimitReached,
            Self::TaskAlreadyStarted { .. } => ErrorCode::TaskAlreadyStarted,
            Self::DuplicateCompletion { .. } => ErrorCode::DuplicateCompletion,
            Self::AccessBlocked { .. } => ErrorCode::AccessBlocked,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::InvalidTransition(_) => ErrorCode::InvalidTransition,
            Self::ValidationError(_) => ErrorCode::ValidationError,
            Self::ConfigurationError(_) | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.code().http_status()
    }

    /// Whether this is an unexpected infrastructure failure rather than a domain rejection
    pub fn is_internal(&self) -> bool {
        self.code() == ErrorCode::InternalError
    }

    /// Status to report for already-started rejections; duplicate races report IN_PROGRESS
    pub fn task_status(&self) -> Option<CompletionStatus> {
        match self {
            Self::TaskAlreadyStarted { task_status } => Some(*task_status),
            Self::DuplicateCompletion { .. } => Some(CompletionStatus::InProgress),
            _ => None,
        }
    }

    pub fn record_not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::RecordNotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } if entity == "user" => {
                EngineError::UserNotFound { user_id: id }
            }
            StoreError::NotFound { entity, id } => EngineError::RecordNotFound { entity, id },
            StoreError::UniqueViolation { key, .. } => EngineError::DuplicateCompletion { task_id: key },
            other => EngineError::Internal(other.to_string()),
        }
    }
}

impl From<StateMachineError> for EngineError {
    fn from(err: StateMachineError) -> Self {
        match err {
            StateMachineError::InvalidTransition { .. } => {
                EngineError::InvalidTransition(err.to_string())
            }
            StateMachineError::Store(store) => store.into(),
        }
    }
}

impl From<ConfigurationError> for EngineError {
    fn from(err: ConfigurationError) -> Self {
        EngineError::ConfigurationError(err.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(EngineError::Unauthorized.http_status(), 401);
        assert_eq!(
            EngineError::TaskAlreadyStarted {
                task_status: CompletionStatus::InProgress
            }
            .http_status(),
            400
        );
        assert_eq!(EngineError::Internal("boom".into()).http_status(), 500);
        assert_eq!(
            EngineError::record_not_found("task", "abc").code(),
            ErrorCode::RecordNotFound
        );
    }

    #[test]
    fn test_store_not_found_maps_by_entity() {
        let user: EngineError = StoreError::not_found("user", "u-1").into();
        assert_eq!(user.code(), ErrorCode::UserNotFound);

        let task: EngineError = StoreError::not_found("task", "t-1").into();
        assert_eq!(task.code(), ErrorCode::RecordNotFound);
    }

    #[test]
    fn test_duplicate_completion_reports_in_progress() {
        let err: EngineError = StoreError::UniqueViolation {
            constraint: "task_completions_user_id_task_id_key".into(),
            key: "t-1".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::DuplicateCompletion);
        assert_eq!(err.task_status(), Some(CompletionStatus::InProgress));
    }

    #[test]
    fn test_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::DailyLimitReached).unwrap();
        assert_eq!(json, "\"DAILY_LIMIT_REACHED\"");
        assert_eq!(ErrorCode::DailyLimitReached.to_string(), "DAILY_LIMIT_REACHED");
    }
}
