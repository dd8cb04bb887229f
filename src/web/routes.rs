use crate::web::handlers;
use crate::web::state::AppState;
use axum::routing::{get, post};
use axum::Router;

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(handlers::list_tasks).post(handlers::start_task))
        .route("/tasks/{task_id}/progress", post(handlers::record_progress))
        .route("/tasks/{task_id}/complete", post(handlers::complete_task))
        .route("/tasks/{task_id}/fail", post(handlers::fail_task))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(task_routes())
        .with_state(state)
}
