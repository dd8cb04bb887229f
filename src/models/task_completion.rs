use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Persisted status of a (user, task) session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    InProgress,
    Completed,
    Failed,
}

impl CompletionStatus {
    /// FAILED sessions may be started again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for CompletionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid completion status: {s}")),
        }
    }
}

/// Ledger row, unique per (user_id, task_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub status: CompletionStatus,
    pub progress: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskCompletion {
    /// Completed at or after `since`
    pub fn completed_since(&self, since: DateTime<Utc>) -> bool {
        self.status == CompletionStatus::Completed
            && self.completed_at.is_some_and(|at| at >= since)
    }
}
