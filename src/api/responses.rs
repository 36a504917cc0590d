//! API request and response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::TimerError,
    state::{Timer, TimerStatus},
};

/// Body of `POST /timers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTimerRequest {
    pub name: String,
    pub duration_secs: u64,
    #[serde(default)]
    pub linked_recipe_id: Option<String>,
}

/// Body of `POST /timers/:id/adjust`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustRequest {
    pub delta_secs: i64,
}

/// Query string of `GET /timers`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// Comma-separated statuses, e.g. `running,paused`
    pub status: Option<String>,
    pub recipe: Option<String>,
}

/// Timer as presented to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    pub id: String,
    pub name: String,
    pub status: TimerStatus,
    pub duration_secs: u64,
    pub remaining_secs: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub linked_recipe_id: Option<String>,
}

impl From<&Timer> for TimerView {
    fn from(timer: &Timer) -> Self {
        Self {
            id: timer.id.to_string(),
            name: timer.name.clone(),
            status: timer.status,
            duration_secs: timer.original_duration.as_secs(),
            // Round up so a timer never shows 0 before it has finished
            remaining_secs: if timer.remaining.subsec_nanos() > 0 {
                timer.remaining.as_secs() + 1
            } else {
                timer.remaining.as_secs()
            },
            created_at: timer.created_at,
            started_at: timer.started_at,
            paused_at: timer.paused_at,
            ended_at: timer.ended_at,
            linked_recipe_id: timer.linked_recipe_id.clone(),
        }
    }
}

/// Response of `POST /timers/cancel-all`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAllResponse {
    pub cancelled: Vec<TimerView>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
    pub running_timers: usize,
}

impl HealthResponse {
    pub fn ok(uptime: String, running_timers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime,
            running_timers,
        }
    }
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Failure of an API call
#[derive(Debug)]
pub enum ApiError {
    Timer(TimerError),
    BadRequest(String),
    Internal(String),
}

impl From<TimerError> for ApiError {
    fn from(e: TimerError) -> Self {
        ApiError::Timer(e)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            ApiError::Timer(TimerError::InvalidArgument(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_argument")
            }
            ApiError::Timer(TimerError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Timer(TimerError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, "invalid_transition")
            }
            ApiError::Timer(TimerError::Store(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "store_failure")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ApiError::Timer(e) => e.to_string(),
            ApiError::BadRequest(message) | ApiError::Internal(message) => message.clone(),
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", message);
        }
        (
            status,
            Json(ErrorResponse {
                error: kind.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn view_rounds_partial_seconds_up() {
        let mut timer = Timer::new("jam", Duration::from_secs(60), None, Utc::now()).unwrap();
        timer.remaining = Duration::from_millis(4_200);
        let view = TimerView::from(&timer);
        assert_eq!(view.remaining_secs, 5);
        assert_eq!(view.duration_secs, 60);
    }

    #[test]
    fn errors_map_to_status_codes() {
        let not_found = ApiError::from(TimerError::NotFound(crate::state::TimerId::new()));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let bad = ApiError::BadRequest("nope".into());
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
