//! In-memory [`TaskStore`] for tests and single-process embedding.
//!
//! All records live behind one `parking_lot::Mutex`, so every trait method is
//! atomic with respect to every other one, which is the same contract the
//! Postgres store gets from its unique index and transactions.

use super::{StartOutcome, StoreError, StoreResult, TaskPage, TaskStore};
use crate::models::{
    CompletionStatus, MembershipPlan, ReferralSnapshot, Task, TaskCompletion, TaskFilter, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<Uuid, User>,
    plans: HashMap<String, MembershipPlan>,
    tasks: HashMap<Uuid, Task>,
    completions: HashMap<(Uuid, Uuid), TaskCompletion>,
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    unavailable: AtomicBool,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.state.lock().users.insert(user.id, user);
    }

    pub fn insert_plan(&self, plan: MembershipPlan) {
        self.state.lock().plans.insert(plan.name.clone(), plan);
    }

    pub fn insert_task(&self, task: Task) {
        self.state.lock().tasks.insert(task.id, task);
    }

    pub fn insert_completion(&self, completion: TaskCompletion) {
        self.state
            .lock()
            .completions
            .insert((completion.user_id, completion.task_id), completion);
    }

    pub fn user(&self, user_id: Uuid) -> Option<User> {
        self.state.lock().users.get(&user_id).cloned()
    }

    pub fn task(&self, task_id: Uuid) -> Option<Task> {
        self.state.lock().tasks.get(&task_id).cloned()
    }

    /// Number of rows for the pair; the unique key keeps this at most 1
    pub fn completion_rows(&self, user_id: Uuid, task_id: Uuid) -> usize {
        self.state
            .lock()
            .completions
            .keys()
            .filter(|key| **key == (user_id, task_id))
            .count()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        self.check_available()?;
        Ok(self.state.lock().users.get(&user_id).cloned())
    }

    async fn find_plan_by_name(&self, name: &str) -> StoreResult<Option<MembershipPlan>> {
        self.check_available()?;
        Ok(self.state.lock().plans.get(name).cloned())
    }

    async fn list_referrals(&self, sponsor_id: Uuid) -> StoreResult<Vec<ReferralSnapshot>> {
        self.check_available()?;
        let state = self.state.lock();
        Ok(state
            .users
            .values()
            .filter(|user| user.sponsor_id == Some(sponsor_id))
            .map(|user| ReferralSnapshot {
                user_id: user.id,
                membership_plan: user.membership_plan.clone(),
            })
            .collect())
    }

    async fn find_task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        self.check_available()?;
        Ok(self.state.lock().tasks.get(&task_id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<TaskPage> {
        self.check_available()?;
        let state = self.state.lock();
        let mut matching: Vec<&Task> = state
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matching.len() as u64;
        let tasks = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();

        Ok(TaskPage { tasks, total })
    }

    async fn find_completion(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskCompletion>> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .completions
            .get(&(user_id, task_id))
            .cloned())
    }

    async fn list_completions(
        &self,
        user_id: Uuid,
        task_ids: &[Uuid],
    ) -> StoreResult<Vec<TaskCompletion>> {
        self.check_available()?;
        let state = self.state.lock();
        Ok(task_ids
            .iter()
            .filter_map(|task_id| state.completions.get(&(user_id, *task_id)).cloned())
            .collect())
    }

    async fn count_completions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.check_available()?;
        let state = self.state.lock();
        Ok(state
            .completions
            .values()
            .filter(|c| c.user_id == user_id && c.completed_since(since))
            .count() as i64)
    }

    async fn earnings_rank(&self, user_id: Uuid) -> StoreResult<i64> {
        self.check_available()?;
        let state = self.state.lock();
        let Some(user) = state.users.get(&user_id) else {
            return Ok(1);
        };
        let ahead = state
            .users
            .values()
            .filter(|other| other.total_earnings > user.total_earnings)
            .count() as i64;
        Ok(ahead + 1)
    }

    async fn start_session(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> StoreResult<StartOutcome> {
        self.check_available()?;
        let mut state = self.state.lock();

        if !state.tasks.contains_key(&task_id) {
            return Err(StoreError::not_found("task", task_id));
        }

        let key = (user_id, task_id);
        let completion = match state.completions.get(&key) {
            Some(existing) if !existing.status.is_retryable() => {
                return Ok(StartOutcome::AlreadyActive(existing.clone()));
            }
            Some(failed) => TaskCompletion {
                status: CompletionStatus::InProgress,
                progress: 0,
                started_at,
                completed_at: None,
                ..failed.clone()
            },
            None => TaskCompletion {
                id: Uuid::new_v4(),
                user_id,
                task_id,
                status: CompletionStatus::InProgress,
                progress: 0,
                started_at,
                completed_at: None,
            },
        };

        state.completions.insert(key, completion.clone());
        if let Some(task) = state.tasks.get_mut(&task_id) {
            task.attempts += 1;
        }

        Ok(StartOutcome::Started(completion))
    }

    async fn update_progress(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        progress: i32,
    ) -> StoreResult<Option<TaskCompletion>> {
        self.check_available()?;
        let mut state = self.state.lock();
        Ok(state
            .completions
            .get_mut(&(user_id, task_id))
            .filter(|c| c.status == CompletionStatus::InProgress)
            .map(|c| {
                c.progress = progress;
                c.clone()
            }))
    }

    async fn complete_and_credit(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        reward: i64,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<Option<TaskCompletion>> {
        self.check_available()?;
        let mut state = self.state.lock();

        let in_progress = state
            .completions
            .get(&(user_id, task_id))
            .is_some_and(|c| c.status == CompletionStatus::InProgress);
        if !in_progress {
            return Ok(None);
        }
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }

        let completion = state
            .completions
            .get_mut(&(user_id, task_id))
            .map(|c| {
                c.status = CompletionStatus::Completed;
                c.progress = 100;
                c.completed_at = Some(completed_at);
                c.clone()
            });

        if let Some(user) = state.users.get_mut(&user_id) {
            user.balance += reward;
            user.total_points += reward;
            user.total_earnings += reward;
            user.tasks_completed += 1;
        }

        Ok(completion)
    }

    async fn mark_failed(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskCompletion>> {
        self.check_available()?;
        let mut state = self.state.lock();
        Ok(state
            .completions
            .get_mut(&(user_id, task_id))
            .filter(|c| c.status == CompletionStatus::InProgress)
            .map(|c| {
                c.status = CompletionStatus::Failed;
                c.clone()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use chrono::Duration;

    fn task(id: Uuid) -> Task {
        Task {
            id,
            title: "Watch the intro".to_string(),
            description: None,
            status: TaskStatus::Active,
            task_type: "VIDEO".to_string(),
            category: None,
            reward: 10,
            article_url: None,
            min_duration: None,
            min_scroll_percentage: None,
            max_attempts: None,
            attempts: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_start_is_idempotent_per_pair() {
        let store = InMemoryTaskStore::new();
        let user_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        store.insert_task(task(task_id));

        let first = store.start_session(user_id, task_id, Utc::now()).await.unwrap();
        assert!(matches!(first, StartOutcome::Started(_)));

        let second = store.start_session(user_id, task_id, Utc::now()).await.unwrap();
        assert!(matches!(second, StartOutcome::AlreadyActive(ref c) if c.status == CompletionStatus::InProgress));

        assert_eq!(store.completion_rows(user_id, task_id), 1);
        assert_eq!(store.task(task_id).unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_failed_session_restarts_with_same_id() {
        let store = InMemoryTaskStore::new();
        let user_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        store.insert_task(task(task_id));

        let StartOutcome::Started(first) =
            store.start_session(user_id, task_id, Utc::now()).await.unwrap()
        else {
            panic!("expected a fresh start");
        };
        store.mark_failed(user_id, task_id).await.unwrap().unwrap();

        let restarted_at = Utc::now() + Duration::minutes(1);
        let StartOutcome::Started(retry) = store
            .start_session(user_id, task_id, restarted_at)
            .await
            .unwrap()
        else {
            panic!("expected FAILED to be retryable");
        };
        assert_eq!(retry.id, first.id);
        assert_eq!(retry.started_at, restarted_at);
        assert_eq!(retry.progress, 0);
        assert_eq!(store.task(task_id).unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_complete_credits_once() {
        let store = InMemoryTaskStore::new();
        let user = User::new(Uuid::new_v4(), Utc::now());
        let user_id = user.id;
        let task_id = Uuid::new_v4();
        store.insert_user(user);
        store.insert_task(task(task_id));
        store.start_session(user_id, task_id, Utc::now()).await.unwrap();

        let done = store
            .complete_and_credit(user_id, task_id, 30, Utc::now())
            .await
            .unwrap();
        assert!(done.is_some());
        let again = store
            .complete_and_credit(user_id, task_id, 30, Utc::now())
            .await
            .unwrap();
        assert!(again.is_none());

        let user = store.user(user_id).unwrap();
        assert_eq!(user.total_earnings, 30);
        assert_eq!(user.balance, 30);
        assert_eq!(user.tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryTaskStore::new();
        store.set_unavailable(true);
        let result = store.find_user(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
