//! # API Errors
//!
//! Every engine rejection becomes `{"error": {"code", "message", ...}}` with
//! the data the client needs to react: the eligibility reason, the daily
//! quota and its reset time, or the current session status. Internal
//! failures keep their detail in the logs and send a generic message.

use crate::error::{EngineError, ErrorCode};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Map, Value};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        self.0.code()
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn body(&self) -> Value {
        let message = if self.0.is_internal() {
            "An internal error occurred".to_string()
        } else {
            self.0.to_string()
        };

        let mut error = Map::new();
        error.insert("code".into(), json!(self.code()));
        error.insert("message".into(), json!(message));

        match &self.0 {
            EngineError::NotEligible { reason } => {
                error.insert("reason".into(), json!(reason));
            }
            EngineError::DailyLimitReached {
                tasks_per_day,
                resets_at,
            } => {
                error.insert("tasksPerDay".into(), json!(tasks_per_day));
                error.insert("resetsAt".into(), json!(resets_at.to_rfc3339()));
            }
            EngineError::RateLimited { limit, reset_time } => {
                error.insert("limit".into(), json!(limit));
                error.insert("resetTime".into(), json!(reset_time.to_rfc3339()));
            }
            _ => {}
        }
        if let Some(status) = self.0.task_status() {
            error.insert("taskStatus".into(), json!(status));
        }

        json!({ "error": error })
    }

    fn retry_after_secs(&self) -> Option<i64> {
        match &self.0 {
            EngineError::RateLimited { reset_time, .. } => {
                Some((*reset_time - Utc::now()).num_seconds().max(1))
            }
            _ => None,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(EngineError::ValidationError(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(EngineError::ValidationError(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();

        if let Some(secs) = self.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
