use crate::eligibility::EligibilityReason;
use crate::models::{Task, TaskCompletion, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query string of a task listing request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub category: Option<String>,
    /// Defaults to ACTIVE
    pub status: Option<TaskStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// A catalog task with its per-user annotations.
///
/// `task.reward` holds the reward this user would be paid, not the stored
/// base amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedTask {
    #[serde(flatten)]
    pub task: Task,
    pub can_start: bool,
    pub is_completed: bool,
    pub is_in_progress: bool,
    pub progress: i32,
    pub requires_referral: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub balance: i64,
    pub total_points: i64,
    pub total_earnings: i64,
    pub tasks_completed: i64,
    pub rank: i64,
    pub completions_today: i64,
    pub completions_this_week: i64,
    pub tasks_per_day: i32,
    pub eligible: bool,
    pub eligibility_reason: EligibilityReason,
    /// Informational; never gates eligibility
    pub earning_ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(u64::from(limit))
        };
        Self {
            page,
            limit,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub tasks: Vec<AnnotatedTask>,
    pub user_stats: UserStats,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTaskRequest {
    pub task_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTaskResponse {
    pub success: bool,
    pub task_completion: TaskCompletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReceipt {
    pub task_completion: TaskCompletion,
    pub reward: i64,
    /// Which reward rule applied: override, plan_derived or fallback
    pub reward_policy: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).total_pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).total_pages, 2);
    }

    #[test]
    fn test_query_uses_type_key() {
        let query: TaskListQuery =
            serde_json::from_str(r#"{"type":"VIDEO","status":"INACTIVE","page":2}"#).unwrap();
        assert_eq!(query.task_type.as_deref(), Some("VIDEO"));
        assert_eq!(query.status, Some(TaskStatus::Inactive));
        assert_eq!(query.page, Some(2));
    }
}
