//! Postgres implementation of [`TaskStore`] over a sqlx pool.
//!
//! Schema lives in `migrations/0001_task_rewards.sql`. Status columns are
//! TEXT and parsed through the models' `FromStr` impls.

use super::{StartOutcome, StoreError, StoreResult, TaskPage, TaskStore};
use crate::models::{
    CompletionStatus, MembershipPlan, MembershipStatus, ReferralSnapshot, Task, TaskCompletion,
    TaskFilter, TaskStatus, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, membership_status, membership_plan, membership_start_date, \
     tasks_enabled, sponsor_id, balance, total_points, total_earnings, tasks_completed, created_at";

const TASK_COLUMNS: &str = "id, title, description, status, type, category, reward, article_url, \
     min_duration, min_scroll_percentage, max_attempts, attempts, created_at";

const COMPLETION_COLUMNS: &str = "id, user_id, task_id, status, progress, started_at, completed_at";

#[derive(Clone, Debug)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_column<T: FromStr>(row: &PgRow, column: &str) -> StoreResult<T> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|_| StoreError::CorruptRow {
        column: column.to_string(),
        value: raw,
    })
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        membership_status: parse_column::<MembershipStatus>(row, "membership_status")?,
        membership_plan: row.try_get("membership_plan")?,
        membership_start_date: row.try_get("membership_start_date")?,
        tasks_enabled: row.try_get("tasks_enabled")?,
        sponsor_id: row.try_get("sponsor_id")?,
        balance: row.try_get("balance")?,
        total_points: row.try_get("total_points")?,
        total_earnings: row.try_get("total_earnings")?,
        tasks_completed: row.try_get("tasks_completed")?,
        created_at: row.try_get("created_at")?,
    })
}

fn task_from_row(row: &PgRow) -> StoreResult<Task> {
    Ok(Task {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: parse_column::<TaskStatus>(row, "status")?,
        task_type: row.try_get("type")?,
        category: row.try_get("category")?,
        reward: row.try_get("reward")?,
        article_url: row.try_get("article_url")?,
        min_duration: row.try_get("min_duration")?,
        min_scroll_percentage: row.try_get("min_scroll_percentage")?,
        max_attempts: row.try_get("max_attempts")?,
        attempts: row.try_get("attempts")?,
        created_at: row.try_get("created_at")?,
    })
}

fn completion_from_row(row: &PgRow) -> StoreResult<TaskCompletion> {
    Ok(TaskCompletion {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        task_id: row.try_get("task_id")?,
        status: parse_column::<CompletionStatus>(row, "status")?,
        progress: row.try_get("progress")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_plan_by_name(&self, name: &str) -> StoreResult<Option<MembershipPlan>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, tasks_per_day, daily_task_earning, max_earning_days
            FROM membership_plans
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> StoreResult<MembershipPlan> {
            Ok(MembershipPlan {
                id: Some(row.try_get("id")?),
                name: row.try_get("name")?,
                tasks_per_day: row.try_get("tasks_per_day")?,
                daily_task_earning: row.try_get("daily_task_earning")?,
                max_earning_days: row.try_get("max_earning_days")?,
            })
        })
        .transpose()
    }

    async fn list_referrals(&self, sponsor_id: Uuid) -> StoreResult<Vec<ReferralSnapshot>> {
        let rows = sqlx::query("SELECT id, membership_plan FROM users WHERE sponsor_id = $1")
            .bind(sponsor_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<ReferralSnapshot> {
                Ok(ReferralSnapshot {
                    user_id: row.try_get("id")?,
                    membership_plan: row.try_get("membership_plan")?,
                })
            })
            .collect()
    }

    async fn find_task(&self, task_id: Uuid) -> StoreResult<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<TaskPage> {
        let started = Instant::now();
        let status = filter.status.to_string();

        let rows = sqlx::query(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE status = $1
              AND ($2::text IS NULL OR type = $2)
              AND ($3::text IS NULL OR category = $3)
            ORDER BY created_at DESC, id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(&status)
        .bind(filter.task_type.as_deref())
        .bind(filter.category.as_deref())
        .bind(i64::from(filter.limit))
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM tasks
            WHERE status = $1
              AND ($2::text IS NULL OR type = $2)
              AND ($3::text IS NULL OR category = $3)
            "#,
        )
        .bind(&status)
        .bind(filter.task_type.as_deref())
        .bind(filter.category.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let tasks = rows.iter().map(task_from_row).collect::<StoreResult<Vec<_>>>()?;

        debug!(
            returned = tasks.len(),
            total = total,
            duration_ms = started.elapsed().as_millis() as u64,
            "Task catalog page loaded"
        );

        Ok(TaskPage {
            tasks,
            total: total.max(0) as u64,
        })
    }

    async fn find_completion(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskCompletion>> {
        let row = sqlx::query(&format!(
            "SELECT {COMPLETION_COLUMNS} FROM task_completions WHERE user_id = $1 AND task_id = $2"
        ))
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(completion_from_row).transpose()
    }

    async fn list_completions(
        &self,
        user_id: Uuid,
        task_ids: &[Uuid],
    ) -> StoreResult<Vec<TaskCompletion>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {COMPLETION_COLUMNS} FROM task_completions WHERE user_id = $1 AND task_id = ANY($2)"
        ))
        .bind(user_id)
        .bind(task_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(completion_from_row).collect()
    }

    async fn count_completions_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM task_completions
            WHERE user_id = $1 AND status = 'COMPLETED' AND completed_at >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn earnings_rank(&self, user_id: Uuid) -> StoreResult<i64> {
        let rank: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) + 1
            FROM users
            WHERE total_earnings > (SELECT total_earnings FROM users WHERE id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(rank)
    }

    async fn start_session(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        started_at: DateTime<Utc>,
    ) -> StoreResult<StartOutcome> {
        let mut tx = self.pool.begin().await?;

        // Concurrent starts serialize on the (user_id, task_id) unique index; the
        // loser sees the winner's IN_PROGRESS row and the WHERE clause rejects it.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO task_completions (id, user_id, task_id, status, progress, started_at, completed_at)
            VALUES ($1, $2, $3, 'IN_PROGRESS', 0, $4, NULL)
            ON CONFLICT (user_id, task_id) DO UPDATE
            SET status = 'IN_PROGRESS', progress = 0, started_at = EXCLUDED.started_at, completed_at = NULL
            WHERE task_completions.status = 'FAILED'
            RETURNING {COMPLETION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(task_id)
        .bind(started_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            let existing = self
                .find_completion(user_id, task_id)
                .await?
                .ok_or_else(|| StoreError::not_found("task_completion", task_id))?;
            return Ok(StartOutcome::AlreadyActive(existing));
        };

        let completion = completion_from_row(&row)?;

        let updated = sqlx::query("UPDATE tasks SET attempts = attempts + 1 WHERE id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(StoreError::not_found("task", task_id));
        }

        tx.commit().await?;
        Ok(StartOutcome::Started(completion))
    }

    async fn update_progress(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        progress: i32,
    ) -> StoreResult<Option<TaskCompletion>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE task_completions
            SET progress = $3
            WHERE user_id = $1 AND task_id = $2 AND status = 'IN_PROGRESS'
            RETURNING {COMPLETION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(task_id)
        .bind(progress)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(completion_from_row).transpose()
    }

    async fn complete_and_credit(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        reward: i64,
        completed_at: DateTime<Utc>,
    ) -> StoreResult<Option<TaskCompletion>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE task_completions
            SET status = 'COMPLETED', progress = 100, completed_at = $3
            WHERE user_id = $1 AND task_id = $2 AND status = 'IN_PROGRESS'
            RETURNING {COMPLETION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(task_id)
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let completion = completion_from_row(&row)?;

        let credited = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance + $2,
                total_points = total_points + $2,
                total_earnings = total_earnings + $2,
                tasks_completed = tasks_completed + 1
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(reward)
        .execute(&mut *tx)
        .await?;

        if credited.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(StoreError::not_found("user", user_id));
        }

        tx.commit().await?;
        Ok(Some(completion))
    }

    async fn mark_failed(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> StoreResult<Option<TaskCompletion>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE task_completions
            SET status = 'FAILED'
            WHERE user_id = $1 AND task_id = $2 AND status = 'IN_PROGRESS'
            RETURNING {COMPLETION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(completion_from_row).transpose()
    }
}
