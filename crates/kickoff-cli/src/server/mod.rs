//! Control server.
//!
//! Hosts one countdown for every display pointed at it, plus the commit-info
//! endpoint the watcher polls so browsers never hold the GitHub token.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use kickoff_core::sources::GitHubCommitSource;
use kickoff_core::TimerService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::*;

pub struct AppState {
    pub timer: TimerService,
    /// `None` when no GitHub org is configured; `/api/commits` then fails.
    pub commits: Option<GitHubCommitSource>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/start", get(start_handler))
        .route("/reset", get(reset_handler))
        .route("/status", get(status_handler))
        .route("/time", get(time_handler))
        .route("/settime", post(settime_handler))
        .route("/api/commits", get(commits_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use kickoff_core::control::{StatusResponse, TimeResponse};
    use kickoff_core::timer::RunState;
    use kickoff_core::{ManualClock, ManualScheduler, MemoryStore, TimerEngine};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    const NOW: u64 = 1_700_000_000_000;

    fn app(commits: Option<GitHubCommitSource>) -> Router {
        let clock = ManualClock::new(NOW);
        let engine = TimerEngine::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
        let timer = TimerService::new(engine, Arc::new(ManualScheduler::new(clock)));
        create_router(Arc::new(AppState { timer, commits }))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(app: &Router, uri: &str) -> (StatusCode, T) {
        let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Test: a fresh server reports idle with no end time.
    #[tokio::test]
    async fn test_fresh_server_is_idle() {
        let app = app(None);
        let (status, body): (_, StatusResponse) = get_json(&app, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.state, RunState::Idle);

        let (_, time): (_, TimeResponse) = get_json(&app, "/time").await;
        assert_eq!(time.end_time, None);
        assert!(!time.running);
    }

    /// Test: start arms the default 24h countdown and reports it running.
    #[tokio::test]
    async fn test_start_then_status() {
        let app = app(None);
        let (status, time): (_, TimeResponse) = get_json(&app, "/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(time.end_time, Some(NOW + 24 * 3_600_000));
        assert!(time.running);

        let (_, body): (_, StatusResponse) = get_json(&app, "/status").await;
        assert_eq!(body.state, RunState::Started);
    }

    /// Test: settime arms relative to now, paused.
    #[tokio::test]
    async fn test_settime() {
        let app = app(None);
        let request = Request::post("/settime")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"hours":1,"minutes":2,"seconds":3}"#))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let time: TimeResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(time.end_time, Some(NOW + 3_723_000));
        assert!(!time.running);
    }

    /// Test: a countdown too long to represent is rejected without touching state.
    #[tokio::test]
    async fn test_settime_rejects_invalid() {
        let app = app(None);
        let request = Request::post("/settime")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"hours":18446744073709551615,"minutes":0,"seconds":0}"#))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, time): (_, TimeResponse) = get_json(&app, "/time").await;
        assert_eq!(time.end_time, None);
    }

    /// Test: reset on an uninitialized countdown leaves it uninitialized.
    #[tokio::test]
    async fn test_reset_uninitialized() {
        let app = app(None);
        let (status, time): (_, TimeResponse) = get_json(&app, "/reset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(time.end_time, None);
    }

    /// Test: missing repo parameter is a 400 with an error body.
    #[tokio::test]
    async fn test_commits_requires_repo() {
        let app = app(None);
        let (status, body): (_, responses::ErrorResponse) = get_json(&app, "/api/commits").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "repo required");
    }

    /// Test: upstream failure maps to 502.
    #[tokio::test]
    async fn test_commits_upstream_failure() {
        let source = GitHubCommitSource::new("hack-org", None).with_api_base("http://127.0.0.1:1");
        let app = app(Some(source));
        let (status, _): (_, responses::ErrorResponse) =
            get_json(&app, "/api/commits?repo=demo-repo").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    /// Test: commits are proxied in the commit-info wire shape.
    #[tokio::test]
    async fn test_commits_proxied() {
        let mut upstream = mockito::Server::new_async().await;
        upstream
            .mock("GET", "/repos/hack-org/demo-repo/commits")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"sha":"abc123","commit":{"message":"init","author":{"name":"Ana"}}}]"#)
            .create_async()
            .await;
        let source = GitHubCommitSource::new("hack-org", None).with_api_base(upstream.url());
        let app = app(Some(source));

        let (status, body): (_, serde_json::Value) =
            get_json(&app, "/api/commits?repo=demo-repo").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sha"], "abc123");
        assert_eq!(body["author"], "Ana");
        assert_eq!(body["totalCommits"], 1);
    }
}
