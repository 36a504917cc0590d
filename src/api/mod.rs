//! HTTP API module
//!
//! A thin JSON adapter over [`TimerController`](crate::controller::TimerController)
//! plus a server-sent event stream of notifier events.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/events", get(events_handler))
        .route("/timers", get(list_handler).post(create_handler))
        .route("/timers/cancel-all", post(cancel_all_handler))
        .route("/timers/:id", get(get_handler).delete(delete_handler))
        .route("/timers/:id/start", post(start_handler))
        .route("/timers/:id/pause", post(pause_handler))
        .route("/timers/:id/cancel", post(cancel_handler))
        .route("/timers/:id/reset", post(reset_handler))
        .route("/timers/:id/adjust", post(adjust_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
