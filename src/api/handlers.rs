//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::responses::{
    AdjustRequest, ApiError, CancelAllResponse, CreateTimerRequest, HealthResponse, ListQuery,
    TimerView,
};
use crate::{
    controller::TimerController,
    error::TimerError,
    state::{AppState, TimerId, TimerStatus},
    store::TimerFilter,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a controller call on the blocking pool; store I/O must not stall the runtime
async fn with_controller<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&TimerController) -> Result<T, TimerError> + Send + 'static,
{
    let controller = Arc::clone(&state.controller);
    tokio::task::spawn_blocking(move || op(&controller))
        .await
        .map_err(|e| ApiError::Internal(format!("controller task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn parse_id(raw: &str) -> Result<TimerId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid timer id {:?}: {}", raw, e)))
}

fn filter_from(query: &ListQuery) -> Result<TimerFilter, ApiError> {
    if let Some(recipe) = query.recipe.as_deref().filter(|r| !r.is_empty()) {
        return Ok(TimerFilter::Recipe(recipe.to_string()));
    }

    match query.status.as_deref().filter(|s| !s.is_empty()) {
        None => Ok(TimerFilter::All),
        Some(raw) => raw
            .split(',')
            .map(str::parse::<TimerStatus>)
            .collect::<Result<Vec<_>, _>>()
            .map(TimerFilter::Statuses)
            .map_err(ApiError::BadRequest),
    }
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let running = state.scheduler().active_ids().len();
    Json(HealthResponse::ok(state.get_uptime(), running))
}

/// Handle GET /timers - List timers, optionally by status or recipe
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<TimerView>> {
    let filter = filter_from(&query)?;
    let timers = with_controller(&state, move |c| c.list(&filter)).await?;
    Ok(Json(timers.iter().map(TimerView::from).collect()))
}

/// Handle POST /timers - Create a timer
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTimerRequest>,
) -> Result<(StatusCode, Json<TimerView>), ApiError> {
    let timer = with_controller(&state, move |c| {
        c.create(
            &body.name,
            Duration::from_secs(body.duration_secs),
            body.linked_recipe_id,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(TimerView::from(&timer))))
}

/// Handle GET /timers/:id
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    let id = parse_id(&id)?;
    let timer = with_controller(&state, move |c| c.get(id)).await?;
    Ok(Json(TimerView::from(&timer)))
}

/// Handle DELETE /timers/:id
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    with_controller(&state, move |c| c.delete(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handle POST /timers/:id/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    let id = parse_id(&id)?;
    let timer = with_controller(&state, move |c| c.start(id)).await?;
    Ok(Json(TimerView::from(&timer)))
}

/// Handle POST /timers/:id/pause
pub async fn pause_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    let id = parse_id(&id)?;
    let timer = with_controller(&state, move |c| c.pause(id)).await?;
    Ok(Json(TimerView::from(&timer)))
}

/// Handle POST /timers/:id/cancel
pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    let id = parse_id(&id)?;
    let timer = with_controller(&state, move |c| c.cancel(id)).await?;
    Ok(Json(TimerView::from(&timer)))
}

/// Handle POST /timers/:id/reset
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<TimerView> {
    let id = parse_id(&id)?;
    let timer = with_controller(&state, move |c| c.reset(id)).await?;
    Ok(Json(TimerView::from(&timer)))
}

/// Handle POST /timers/:id/adjust
pub async fn adjust_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AdjustRequest>,
) -> ApiResult<TimerView> {
    let id = parse_id(&id)?;
    let timer = with_controller(&state, move |c| c.adjust(id, body.delta_secs)).await?;
    Ok(Json(TimerView::from(&timer)))
}

/// Handle POST /timers/cancel-all - Cancel every running or paused timer
pub async fn cancel_all_handler(State(state): State<Arc<AppState>>) -> ApiResult<CancelAllResponse> {
    let cancelled = with_controller(&state, |c| c.cancel_all()).await?;
    info!("Cancel-all endpoint called - {} timer(s) cancelled", cancelled.len());
    Ok(Json(CancelAllResponse {
        cancelled: cancelled.iter().map(TimerView::from).collect(),
    }))
}

/// Handle GET /events - Stream finished/progress events as server-sent events
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notifier().subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = if event.is_finished() { "finished" } else { "progress" };
                    let sse = Event::default()
                        .event(name)
                        .json_data(&event)
                        .unwrap_or_else(|e| Event::default().comment(format!("dropped event: {}", e)));
                    return Some((Ok::<Event, Infallible>(sse), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, {} event(s) skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
