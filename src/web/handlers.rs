//! # Task Handlers

use crate::engine::{
    CompletionReceipt, StartTaskRequest, StartTaskResponse, TaskListQuery, TaskListResponse,
};
use crate::models::TaskCompletion;
use crate::web::errors::ApiResult;
use crate::web::extractors::Caller;
use crate::web::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ProgressRequest {
    pub progress: i32,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// GET /tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    query: Result<Query<TaskListQuery>, QueryRejection>,
) -> ApiResult<Json<TaskListResponse>> {
    let Query(query) = query?;
    debug!(user_id = ?ctx.user_id, ?query, "Listing tasks");

    let response = state.engine.list_tasks(&ctx, &query).await?;
    Ok(Json(response))
}

/// POST /tasks
pub async fn start_task(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    request: Result<Json<StartTaskRequest>, JsonRejection>,
) -> ApiResult<Json<StartTaskResponse>> {
    let Json(request) = request?;
    info!(user_id = ?ctx.user_id, task_id = %request.task_id, "Starting task");

    let response = state.engine.start_task(&ctx, request.task_id).await?;
    Ok(Json(response))
}

/// POST /tasks/{task_id}/progress
pub async fn record_progress(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(task_id): Path<Uuid>,
    request: Result<Json<ProgressRequest>, JsonRejection>,
) -> ApiResult<Json<TaskCompletion>> {
    let Json(request) = request?;
    debug!(user_id = ?ctx.user_id, %task_id, progress = request.progress, "Recording progress");

    let completion = state
        .engine
        .record_progress(&ctx, task_id, request.progress)
        .await?;
    Ok(Json(completion))
}

/// POST /tasks/{task_id}/complete
pub async fn complete_task(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<CompletionReceipt>> {
    info!(user_id = ?ctx.user_id, %task_id, "Completing task");

    let receipt = state.engine.complete_task(&ctx, task_id).await?;
    Ok(Json(receipt))
}

/// POST /tasks/{task_id}/fail
pub async fn fail_task(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskCompletion>> {
    info!(user_id = ?ctx.user_id, %task_id, "Failing task");

    let completion = state.engine.fail_task(&ctx, task_id).await?;
    Ok(Json(completion))
}
