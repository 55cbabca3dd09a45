//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use kickoff_core::control::{SetTimeRequest, StatusResponse, TimeResponse};
use kickoff_core::timer::RunState;
use kickoff_core::{CommitInfo, CommitSource, TimerEngine};
use serde::Deserialize;
use tracing::{info, warn};

use super::responses::{ErrorResponse, HealthResponse};
use super::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn current_time(state: &AppState) -> Json<TimeResponse> {
    Json(state.timer.with_engine(|engine| TimeResponse::from(engine.state())))
}

/// Handle GET /start
pub async fn start_handler(State(state): State<Arc<AppState>>) -> Json<TimeResponse> {
    if state.timer.execute(TimerEngine::start).is_some() {
        info!("start requested over HTTP");
    }
    current_time(&state)
}

/// Handle GET /reset
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Json<TimeResponse> {
    if state.timer.execute(TimerEngine::reset).is_some() {
        info!("reset requested over HTTP");
    }
    current_time(&state)
}

/// Handle GET /status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let running = state.timer.with_engine(TimerEngine::is_running);
    Json(StatusResponse {
        state: RunState::from(running),
    })
}

/// Handle GET /time
pub async fn time_handler(State(state): State<Arc<AppState>>) -> Json<TimeResponse> {
    current_time(&state)
}

/// Handle POST /settime
pub async fn settime_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetTimeRequest>,
) -> Result<Json<TimeResponse>, ApiError> {
    let result = state.timer.with_engine_mut(|engine| {
        engine.set_time(request.hours, request.minutes, request.seconds)
    });
    match result {
        Ok(event) => {
            state.timer.publish(event);
            Ok(current_time(&state))
        }
        Err(e) => {
            warn!(error = %e, "rejected settime");
            Err(api_error(StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommitsQuery {
    pub repo: Option<String>,
}

/// Handle GET /api/commits?repo=<name>
pub async fn commits_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CommitsQuery>,
) -> Result<Json<CommitInfo>, ApiError> {
    let Some(repo) = query.repo.filter(|r| !r.trim().is_empty()) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "repo required"));
    };
    let Some(source) = &state.commits else {
        return Err(api_error(StatusCode::BAD_GATEWAY, "github.org is not configured"));
    };
    source.fetch(&repo).await.map(Json).map_err(|e| {
        warn!(repo = %repo, error = %e, "upstream commit fetch failed");
        api_error(StatusCode::BAD_GATEWAY, "failed to fetch commits")
    })
}

/// Handle GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (running, degraded) = state
        .timer
        .with_engine(|engine| (engine.is_running(), engine.is_degraded()));
    Json(HealthResponse {
        status: "ok".to_string(),
        running,
        degraded,
    })
}
