use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// A paid task from the admin-managed catalog
///
/// `reward` is the stored base amount; the amount shown to and paid to a user
/// is always recomputed by [`crate::reward`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub task_type: String,
    pub category: Option<String>,
    pub reward: i64,
    pub article_url: Option<String>,
    pub min_duration: Option<i32>,
    pub min_scroll_percentage: Option<i32>,
    pub max_attempts: Option<i32>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active
    }
}

/// Catalog query used by task listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskFilter {
    pub task_type: Option<String>,
    pub category: Option<String>,
    pub status: TaskStatus,
    pub page: u32,
    pub limit: u32,
}

impl TaskFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn matches(&self, task: &Task) -> bool {
        task.status == self.status
            && self
                .task_type
                .as_ref()
                .map_or(true, |t| t == &task.task_type)
            && self
                .category
                .as_ref()
                .map_or(true, |c| task.category.as_ref() == Some(c))
    }

    /// Stable key for caching a catalog page
    pub fn cache_key(&self) -> String {
        format!(
            "tasks:{}:{}:{}:{}:{}",
            self.status,
            self.task_type.as_deref().unwrap_or("*"),
            self.category.as_deref().unwrap_or("*"),
            self.page,
            self.limit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(task_type: &str, category: Option<&str>) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Read the article".to_string(),
            description: None,
            status: TaskStatus::Active,
            task_type: task_type.to_string(),
            category: category.map(str::to_string),
            reward: 10,
            article_url: None,
            min_duration: None,
            min_scroll_percentage: None,
            max_attempts: None,
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_matching() {
        let filter = TaskFilter {
            task_type: Some("ARTICLE".to_string()),
            category: None,
            status: TaskStatus::Active,
            page: 1,
            limit: 10,
        };
        assert!(filter.matches(&task("ARTICLE", Some("news"))));
        assert!(!filter.matches(&task("VIDEO", Some("news"))));

        let by_category = TaskFilter {
            task_type: None,
            category: Some("news".to_string()),
            ..filter
        };
        assert!(by_category.matches(&task("VIDEO", Some("news"))));
        assert!(!by_category.matches(&task("VIDEO", None)));
    }

    #[test]
    fn test_offset_and_cache_key() {
        let filter = TaskFilter {
            task_type: None,
            category: Some("news".to_string()),
            status: TaskStatus::Active,
            page: 3,
            limit: 20,
        };
        assert_eq!(filter.offset(), 40);
        assert_eq!(filter.cache_key(), "tasks:ACTIVE:*:news:3:20");
    }
}
