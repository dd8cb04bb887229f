use super::errors::{invalid_transition, StateMachineResult};
use super::events::SessionEvent;
use super::states::SessionState;
use crate::models::TaskCompletion;
use crate::persistence::{StartOutcome, TaskStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Transition table for a session
pub fn determine_target_state(
    current: SessionState,
    event: &SessionEvent,
) -> StateMachineResult<SessionState> {
    let target = match (current, event) {
        // Start, including retry after failure
        (SessionState::Absent, SessionEvent::Start) => SessionState::InProgress,
        (SessionState::Failed, SessionEvent::Start) => SessionState::InProgress,

        (SessionState::InProgress, SessionEvent::Progress(_)) => SessionState::InProgress,
        (SessionState::InProgress, SessionEvent::Complete) => SessionState::Completed,
        (SessionState::InProgress, SessionEvent::Fail) => SessionState::Failed,

        (from, event) => return Err(invalid_transition(from, event.event_type())),
    };

    Ok(target)
}

/// Drives session transitions through the store's atomic primitives
#[derive(Clone)]
pub struct TaskSessionMachine {
    store: Arc<dyn TaskStore>,
}

impl std::fmt::Debug for TaskSessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSessionMachine").finish_non_exhaustive()
    }
}

impl TaskSessionMachine {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub async fn current_state(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> StateMachineResult<SessionState> {
        let completion = self.store.find_completion(user_id, task_id).await?;
        Ok(SessionState::from(completion.map(|c| c.status)))
    }

    /// Upsert an IN_PROGRESS row keyed on (user, task).
    ///
    /// Returns [`StartOutcome::AlreadyActive`] when a concurrent start won the
    /// upsert; the caller decides how to report it.
    pub async fn start(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> StateMachineResult<StartOutcome> {
        let current = self.current_state(user_id, task_id).await?;
        determine_target_state(current, &SessionEvent::Start)?;

        let outcome = self.store.start_session(user_id, task_id, now).await?;
        debug!(
            user_id = %user_id,
            task_id = %task_id,
            from = %current,
            won = matches!(outcome, StartOutcome::Started(_)),
            "Session start applied"
        );
        Ok(outcome)
    }

    pub async fn progress(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        progress: i32,
    ) -> StateMachineResult<TaskCompletion> {
        let event = SessionEvent::Progress(progress);
        let current = self.current_state(user_id, task_id).await?;
        determine_target_state(current, &event)?;

        match self.store.update_progress(user_id, task_id, progress).await? {
            Some(completion) => Ok(completion),
            None => Err(self.lost_race(user_id, task_id, &event).await),
        }
    }

    /// Flip to COMPLETED and credit `reward` as one unit; never credits twice
    pub async fn complete(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        reward: i64,
        now: DateTime<Utc>,
    ) -> StateMachineResult<TaskCompletion> {
        let event = SessionEvent::Complete;
        let current = self.current_state(user_id, task_id).await?;
        determine_target_state(current, &event)?;

        match self
            .store
            .complete_and_credit(user_id, task_id, reward, now)
            .await?
        {
            Some(completion) => Ok(completion),
            None => Err(self.lost_race(user_id, task_id, &event).await),
        }
    }

    pub async fn fail(&self, user_id: Uuid, task_id: Uuid) -> StateMachineResult<TaskCompletion> {
        let event = SessionEvent::Fail;
        let current = self.current_state(user_id, task_id).await?;
        determine_target_state(current, &event)?;

        match self.store.mark_failed(user_id, task_id).await? {
            Some(completion) => Ok(completion),
            None => Err(self.lost_race(user_id, task_id, &event).await),
        }
    }

    /// The atomic write found the row in another state; report the state that won
    async fn lost_race(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        event: &SessionEvent,
    ) -> super::StateMachineError {
        match self.current_state(user_id, task_id).await {
            Ok(state) => invalid_transition(state, event.event_type()),
            Err(e) => e,
        }
    }
}
