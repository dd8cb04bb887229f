use crate::models::CompletionStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session state, including the implicit state before any row exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No completion row for the pair yet
    #[default]
    Absent,
    InProgress,
    Completed,
    /// Retryable; does not count as "already started"
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether a start request is allowed from this state
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Absent | Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Persisted status, `None` for [`SessionState::Absent`]
    pub fn completion_status(&self) -> Option<CompletionStatus> {
        match self {
            Self::Absent => None,
            Self::InProgress => Some(CompletionStatus::InProgress),
            Self::Completed => Some(CompletionStatus::Completed),
            Self::Failed => Some(CompletionStatus::Failed),
        }
    }
}

impl From<CompletionStatus> for SessionState {
    fn from(status: CompletionStatus) -> Self {
        match status {
            CompletionStatus::InProgress => Self::InProgress,
            CompletionStatus::Completed => Self::Completed,
            CompletionStatus::Failed => Self::Failed,
        }
    }
}

impl From<Option<CompletionStatus>> for SessionState {
    fn from(status: Option<CompletionStatus>) -> Self {
        status.map(Self::from).unwrap_or_default()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "ABSENT"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ABSENT" => Ok(Self::Absent),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid session state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_absent_and_failed_can_start() {
        assert!(SessionState::Absent.can_start());
        assert!(SessionState::Failed.can_start());
        assert!(!SessionState::InProgress.can_start());
        assert!(!SessionState::Completed.can_start());
    }

    #[test]
    fn test_from_completion_status() {
        assert_eq!(SessionState::from(None), SessionState::Absent);
        assert_eq!(
            SessionState::from(Some(CompletionStatus::Failed)),
            SessionState::Failed
        );
        assert_eq!(SessionState::Absent.completion_status(), None);
        assert_eq!(
            SessionState::Completed.completion_status(),
            Some(CompletionStatus::Completed)
        );
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(SessionState::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!("FAILED".parse::<SessionState>().unwrap(), SessionState::Failed);
        assert!("pending".parse::<SessionState>().is_err());
    }
}
