//! # Web API
//!
//! HTTP surface over [`TaskEngine`](crate::engine::TaskEngine):
//!
//! - `GET /tasks` lists the catalog annotated for the caller
//! - `POST /tasks` starts a task session
//! - `POST /tasks/{task_id}/progress`, `/complete`, `/fail` drive an open session
//! - `GET /health` liveness probe
//!
//! Authentication happens upstream. The gateway forwards the session's user
//! id in `x-user-id` and the origin country in `x-country-code` (or
//! Cloudflare's `cf-ipcountry`).

pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use errors::{ApiError, ApiResult};
pub use extractors::Caller;
pub use routes::create_router;
pub use state::AppState;
