//! Builders for engine test data

use chrono::{DateTime, Duration, Utc};
use task_rewards::models::{MembershipPlan, MembershipStatus, Task, TaskStatus, User};
use task_rewards::persistence::InMemoryTaskStore;
use uuid::Uuid;

/// Builder for members; defaults to an active STANDARD member who joined a day before `now`
pub struct UserBuilder {
    user: User,
}

impl UserBuilder {
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut user = User::new(Uuid::new_v4(), now - Duration::days(1));
        user.membership_status = MembershipStatus::Active;
        user.membership_plan = Some("STANDARD".to_string());
        user.membership_start_date = Some(now - Duration::days(1));
        user.tasks_enabled = true;
        Self { user }
    }

    pub fn joined_days_ago(mut self, now: DateTime<Utc>, days: i64) -> Self {
        let joined = now - Duration::days(days);
        self.user.membership_start_date = Some(joined);
        self.user.created_at = joined;
        self
    }

    pub fn plan(mut self, name: &str) -> Self {
        self.user.membership_plan = Some(name.to_string());
        self
    }

    pub fn without_plan(mut self) -> Self {
        self.user.membership_plan = None;
        self
    }

    pub fn sponsored_by(mut self, sponsor_id: Uuid) -> Self {
        self.user.sponsor_id = Some(sponsor_id);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.user.membership_status = MembershipStatus::Inactive;
        self
    }

    pub fn total_earnings(mut self, amount: i64) -> Self {
        self.user.total_earnings = amount;
        self
    }

    pub fn build(self) -> User {
        self.user
    }

    pub fn insert(self, store: &InMemoryTaskStore) -> Uuid {
        let id = self.user.id;
        store.insert_user(self.user);
        id
    }
}

pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            task: Task {
                id: Uuid::new_v4(),
                title: title.to_string(),
                description: None,
                status: TaskStatus::Active,
                task_type: "ARTICLE".to_string(),
                category: None,
                reward: 10,
                article_url: None,
                min_duration: None,
                min_scroll_percentage: None,
                max_attempts: None,
                attempts: 0,
                created_at: Utc::now(),
            },
        }
    }

    pub fn task_type(mut self, task_type: &str) -> Self {
        self.task.task_type = task_type.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.task.category = Some(category.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.task.status = TaskStatus::Inactive;
        self
    }

    pub fn insert(self, store: &InMemoryTaskStore) -> Uuid {
        let id = self.task.id;
        store.insert_task(self.task);
        id
    }
}

pub fn persisted_plan(name: &str, tasks_per_day: i32, daily_task_earning: i64) -> MembershipPlan {
    MembershipPlan {
        id: Some(Uuid::new_v4()),
        name: name.to_string(),
        tasks_per_day,
        daily_task_earning,
        max_earning_days: 365,
    }
}

/// Insert `count` active tasks and return their ids
pub fn seed_tasks(store: &InMemoryTaskStore, count: usize) -> Vec<Uuid> {
    (0..count)
        .map(|i| TaskBuilder::new(&format!("Task {i}")).insert(store))
        .collect()
}
