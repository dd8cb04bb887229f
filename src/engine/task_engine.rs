use super::clock::{Clock, SystemClock};
use super::types::{
    AnnotatedTask, CompletionReceipt, Pagination, StartTaskResponse, TaskListQuery,
    TaskListResponse, UserStats,
};
use crate::cache::{CacheRegistry, KeyPattern};
use crate::config::EngineConfig;
use crate::constants::{cache_instances, default_plan, rate_limit_presets};
use crate::eligibility::{EligibilityDecision, EligibilityResolver};
use crate::error::{EngineError, EngineResult};
use crate::gate::{
    AccessDecision, AccessGate, CountryBlocklistGate, EngineEvent, EventSink, RequestContext,
    TracingEventSink,
};
use crate::logging::{log_error, log_task_operation};
use crate::models::{
    CompletionStatus, MembershipPlan, Task, TaskCompletion, TaskFilter, User,
};
use crate::persistence::{StartOutcome, TaskStore};
use crate::rate_limiter::RateLimiter;
use crate::reward::{EnvRewardOverride, RewardOverrideSource, RewardPolicy};
use crate::state_machine::{SessionState, StateMachineError, TaskSessionMachine};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Root of the task eligibility and reward engine.
///
/// Every operation runs the same admission sequence before touching task
/// state: access gate, authenticated user, then the `api` rate-limit preset.
#[derive(Clone)]
pub struct TaskEngine {
    store: Arc<dyn TaskStore>,
    sessions: TaskSessionMachine,
    resolver: EligibilityResolver,
    rate_limiter: RateLimiter,
    caches: CacheRegistry,
    gate: Arc<dyn AccessGate>,
    events: Arc<dyn EventSink>,
    reward_override: Arc<dyn RewardOverrideSource>,
    clock: Arc<dyn Clock>,
    config: Arc<EngineConfig>,
}

impl std::fmt::Debug for TaskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEngine")
            .field("gate", &self.gate)
            .field("events", &self.events)
            .field("reward_override", &self.reward_override)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TaskEngine {
    /// Engine with production collaborators derived from `config`
    pub fn new(store: Arc<dyn TaskStore>, config: EngineConfig) -> Self {
        Self {
            sessions: TaskSessionMachine::new(store.clone()),
            resolver: EligibilityResolver::new(config.eligibility.trial_days),
            rate_limiter: RateLimiter::in_memory(config.rate_limits.clone()),
            caches: CacheRegistry::from_config(&config.cache),
            gate: Arc::new(CountryBlocklistGate::new(&config.access.blocked_countries)),
            events: Arc::new(TracingEventSink),
            reward_override: Arc::new(EnvRewardOverride::new(
                config.rewards.override_env_var.clone(),
            )),
            clock: Arc::new(SystemClock),
            config: Arc::new(config),
            store,
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn AccessGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_reward_override(mut self, source: Arc<dyn RewardOverrideSource>) -> Self {
        self.reward_override = source;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_caches(mut self, caches: CacheRegistry) -> Self {
        self.caches = caches;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Catalog page annotated for the caller, plus the caller's stats
    pub async fn list_tasks(
        &self,
        ctx: &RequestContext,
        query: &TaskListQuery,
    ) -> EngineResult<TaskListResponse> {
        let result = self.list_tasks_inner(ctx, query).await;
        self.observe("list_tasks", &result);
        result
    }

    /// Open an IN_PROGRESS session for `task_id`
    pub async fn start_task(
        &self,
        ctx: &RequestContext,
        task_id: Uuid,
    ) -> EngineResult<StartTaskResponse> {
        let result = self.start_task_inner(ctx, task_id).await;
        self.observe("start_task", &result);
        result
    }

    /// Update progress (0..=100) of an IN_PROGRESS session
    pub async fn record_progress(
        &self,
        ctx: &RequestContext,
        task_id: Uuid,
        progress: i32,
    ) -> EngineResult<TaskCompletion> {
        let result = self.record_progress_inner(ctx, task_id, progress).await;
        self.observe("record_progress", &result);
        result
    }

    /// Complete an IN_PROGRESS session and credit the reward exactly once
    pub async fn complete_task(
        &self,
        ctx: &RequestContext,
        task_id: Uuid,
    ) -> EngineResult<CompletionReceipt> {
        let result = self.complete_task_inner(ctx, task_id).await;
        self.observe("complete_task", &result);
        result
    }

    /// Mark an IN_PROGRESS session FAILED; it can be started again
    pub async fn fail_task(
        &self,
        ctx: &RequestContext,
        task_id: Uuid,
    ) -> EngineResult<TaskCompletion> {
        let result = self.fail_task_inner(ctx, task_id).await;
        self.observe("fail_task", &result);
        result
    }

    async fn list_tasks_inner(
        &self,
        ctx: &RequestContext,
        query: &TaskListQuery,
    ) -> EngineResult<TaskListResponse> {
        let user_id = self.admit(ctx).await?;
        let filter = self.build_filter(query)?;

        let user = self.load_user(user_id).await?;
        let plan = self.resolve_plan(&user).await?;
        let now = self.clock.now();
        let decision = self.evaluate(&user, &plan, now).await?;

        let completions_today = self
            .store
            .count_completions_since(user_id, self.clock.start_of_day())
            .await?;
        let completions_this_week = self
            .store
            .count_completions_since(user_id, self.clock.start_of_week())
            .await?;
        let rank = self
            .caches
            .instance(cache_instances::USER_AGGREGATES)
            .get_or_set(&format!("user:{user_id}:rank"), None, || {
                self.store.earnings_rank(user_id)
            })
            .await?;

        let page = self
            .caches
            .instance(cache_instances::TASK_CATALOG)
            .get_or_set(&filter.cache_key(), None, || self.store.list_tasks(&filter))
            .await?;

        let task_ids: Vec<Uuid> = page.tasks.iter().map(|t| t.id).collect();
        let sessions: HashMap<Uuid, TaskCompletion> = self
            .store
            .list_completions(user_id, &task_ids)
            .await?
            .into_iter()
            .map(|c| (c.task_id, c))
            .collect();

        let policy = self.reward_policy(&plan);
        let reward = policy.amount();
        let quota_open = completions_today < i64::from(plan.tasks_per_day);

        let tasks = page
            .tasks
            .into_iter()
            .map(|task| {
                let session = sessions.get(&task.id);
                annotate(task, session, reward, &decision, quota_open)
            })
            .collect();

        debug!(
            user_id = %user_id,
            reward,
            policy = policy.name(),
            eligible = decision.eligible,
            completions_today,
            "Task list annotated"
        );

        Ok(TaskListResponse {
            tasks,
            user_stats: UserStats {
                balance: user.balance,
                total_points: user.total_points,
                total_earnings: user.total_earnings,
                tasks_completed: user.tasks_completed,
                rank,
                completions_today,
                completions_this_week,
                tasks_per_day: plan.tasks_per_day,
                eligible: decision.eligible,
                eligibility_reason: decision.reason,
                earning_ends_at: earning_ends_at(&user, &plan),
            },
            pagination: Pagination::new(filter.page, filter.limit, page.total),
        })
    }

    async fn start_task_inner(
        &self,
        ctx: &RequestContext,
        task_id: Uuid,
    ) -> EngineResult<StartTaskResponse> {
        let user_id = self.admit(ctx).await?;
        let user = self.load_user(user_id).await?;
        let task = self
            .store
            .find_task(task_id)
            .await?
            .filter(Task::is_active)
            .ok_or_else(|| EngineError::record_not_found("task", task_id))?;

        let plan = self.resolve_plan(&user).await?;
        let now = self.clock.now();

        let decision = self.evaluate(&user, &plan, now).await?;
        if !decision.eligible {
            return Err(EngineError::NotEligible {
                reason: decision.reason,
            });
        }

        let completions_today = self
            .store
            .count_completions_since(user_id, self.clock.start_of_day())
            .await?;
        if completions_today >= i64::from(plan.tasks_per_day) {
            return Err(EngineError::DailyLimitReached {
                tasks_per_day: plan.tasks_per_day,
                resets_at: self.clock.next_day_start(),
            });
        }

        let completion = match self.sessions.start(user_id, task.id, now).await {
            Ok(StartOutcome::Started(completion)) => completion,
            // A concurrent start won the upsert between our checks and the write
            Ok(StartOutcome::AlreadyActive(existing)) => {
                return Err(EngineError::TaskAlreadyStarted {
                    task_status: existing.status,
                })
            }
            Err(StateMachineError::InvalidTransition { from, .. }) => {
                return Err(already_started(from));
            }
            Err(e) => return Err(e.into()),
        };

        log_task_operation("start", user_id, Some(task.id), "IN_PROGRESS", None);
        self.emit(EngineEvent::TaskStarted {
            user_id,
            task_id: task.id,
            completion_id: completion.id,
            at: now,
        })
        .await;

        Ok(StartTaskResponse {
            success: true,
            task_completion: completion,
        })
    }

    async fn record_progress_inner(
        &self,
        ctx: &RequestContext,
        task_id: Uuid,
        progress: i32,
    ) -> EngineResult<TaskCompletion> {
        if !(0..=100).contains(&progress) {
            return Err(EngineError::ValidationError(format!(
                "progress must be between 0 and 100, got {progress}"
            )));
        }
        let user_id = self.admit(ctx).await?;

        let completion = self.sessions.progress(user_id, task_id, progress).await?;

        self.emit(EngineEvent::TaskProgressed {
            user_id,
            task_id,
            progress,
            at: self.clock.now(),
        })
        .await;
        Ok(completion)
    }

    async fn complete_task_inner(
        &self,
        ctx: &RequestContext,
        task_id: Uuid,
    ) -> EngineResult<CompletionReceipt> {
        let user_id = self.admit(ctx).await?;
        let user = self.load_user(user_id).await?;
        let plan = self.resolve_plan(&user).await?;

        // Recomputed at completion time so plan edits and the override apply immediately
        let policy = self.reward_policy(&plan);
        let reward = policy.amount();
        let now = self.clock.now();

        let completion = self.sessions.complete(user_id, task_id, reward, now).await?;

        let removed = self
            .caches
            .instance(cache_instances::USER_AGGREGATES)
            .invalidate_pattern(&KeyPattern::substring(format!("user:{user_id}:")))
            .await;

        log_task_operation(
            "complete",
            user_id,
            Some(task_id),
            "COMPLETED",
            Some(&format!("reward={reward} policy={} invalidated={removed}", policy.name())),
        );
        self.emit(EngineEvent::TaskCompleted {
            user_id,
            task_id,
            reward,
            at: now,
        })
        .await;

        Ok(CompletionReceipt {
            task_completion: completion,
            reward,
            reward_policy: policy.name().to_string(),
        })
    }

    async fn fail_task_inner(
        &self,
        ctx: &RequestContext,
        task_id: Uuid,
    ) -> EngineResult<TaskCompletion> {
        let user_id = self.admit(ctx).await?;
        let completion = self.sessions.fail(user_id, task_id).await?;

        log_task_operation("fail", user_id, Some(task_id), "FAILED", None);
        self.emit(EngineEvent::TaskFailed {
            user_id,
            task_id,
            at: self.clock.now(),
        })
        .await;
        Ok(completion)
    }

    /// Access gate, authentication, then rate limit
    async fn admit(&self, ctx: &RequestContext) -> EngineResult<Uuid> {
        if let AccessDecision::Block { reason } = self.gate.check(ctx) {
            return Err(EngineError::AccessBlocked { reason });
        }

        let user_id = ctx.user_id.ok_or(EngineError::Unauthorized)?;

        let preset = self.rate_limiter.preset(rate_limit_presets::API);
        let decision = self
            .rate_limiter
            .check_limit_at(
                &format!("{}:{user_id}", rate_limit_presets::API),
                preset.limit,
                preset.window(),
                self.clock.now(),
            )
            .await;
        if !decision.success {
            return Err(EngineError::RateLimited {
                limit: decision.limit,
                reset_time: decision.reset_time,
            });
        }

        Ok(user_id)
    }

    fn build_filter(&self, query: &TaskListQuery) -> EngineResult<TaskFilter> {
        let listing = &self.config.listing;

        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(EngineError::ValidationError(
                "page must be at least 1".to_string(),
            ));
        }

        let limit = query.limit.unwrap_or(listing.default_page_size);
        if limit == 0 || limit > listing.max_page_size {
            return Err(EngineError::ValidationError(format!(
                "limit must be between 1 and {}",
                listing.max_page_size
            )));
        }

        Ok(TaskFilter {
            task_type: non_empty(query.task_type.as_deref()),
            category: non_empty(query.category.as_deref()),
            status: query.status.unwrap_or_default(),
            page,
            limit,
        })
    }

    async fn load_user(&self, user_id: Uuid) -> EngineResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| EngineError::UserNotFound {
                user_id: user_id.to_string(),
            })
    }

    /// Persisted plan by name, else the built-in default under the same name
    async fn resolve_plan(&self, user: &User) -> EngineResult<MembershipPlan> {
        let name = user
            .membership_plan
            .as_deref()
            .unwrap_or(default_plan::NAME);
        let plan = self.store.find_plan_by_name(name).await?;
        Ok(plan.unwrap_or_else(|| MembershipPlan::builtin_default(name)))
    }

    async fn evaluate(
        &self,
        user: &User,
        plan: &MembershipPlan,
        now: DateTime<Utc>,
    ) -> EngineResult<EligibilityDecision> {
        // Never cached: referral state changes independently of this user
        let referrals = self.store.list_referrals(user.id).await?;
        Ok(self.resolver.resolve(user, plan, &referrals, now))
    }

    fn reward_policy(&self, plan: &MembershipPlan) -> RewardPolicy {
        RewardPolicy::resolve(
            self.reward_override.current(),
            plan,
            self.config.rewards.fallback_amount,
        )
    }

    async fn emit(&self, event: EngineEvent) {
        let name = event.name();
        if let Err(e) = self.events.emit(event).await {
            warn!(event = name, error = %e, "Event sink failed; state change already committed");
        }
    }

    fn observe<T>(&self, operation: &str, result: &EngineResult<T>) {
        match result {
            Err(e) if e.is_internal() => {
                log_error("task_engine", operation, &e.to_string(), None);
            }
            Err(e) => {
                debug!(operation, code = %e.code(), error = %e, "Request rejected");
            }
            Ok(_) => {}
        }
    }
}

fn annotate(
    mut task: Task,
    session: Option<&TaskCompletion>,
    reward: i64,
    decision: &EligibilityDecision,
    quota_open: bool,
) -> AnnotatedTask {
    let state = SessionState::from(session.map(|c| c.status));
    task.reward = reward;

    AnnotatedTask {
        can_start: decision.eligible && quota_open && state.can_start(),
        is_completed: state == SessionState::Completed,
        is_in_progress: state.is_active(),
        progress: session.map_or(0, |c| c.progress),
        requires_referral: decision.requires_referral(),
        task,
    }
}

fn already_started(from: SessionState) -> EngineError {
    EngineError::TaskAlreadyStarted {
        task_status: from
            .completion_status()
            .unwrap_or(CompletionStatus::InProgress),
    }
}

/// Saturates at the latest representable instant for oversized plans
fn earning_ends_at(user: &User, plan: &MembershipPlan) -> DateTime<Utc> {
    Duration::try_days(i64::from(plan.max_earning_days))
        .and_then(|span| user.earning_anchor().checked_add_signed(span))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
