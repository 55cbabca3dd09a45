//! HTTP-level tests for commit sources and the control client.
//!
//! Uses mocked HTTP responses so no network access or GitHub credentials are
//! required.

use kickoff_core::control::{ControlClient, RemoteTimer};
use kickoff_core::sources::{CommitSource, GitHubCommitSource, ProxyCommitSource};
use kickoff_core::timer::RunState;
use kickoff_core::{ControlError, FetchError, ManualClock, TimerPhase};
use mockito::Matcher;
use std::sync::Arc;

/// Test: proxy source decodes the commit-info wire shape.
#[tokio::test]
async fn test_proxy_fetch_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/commits")
        .match_query(Matcher::UrlEncoded("repo".into(), "demo-repo".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"sha":"abc123","message":"init","author":"ana","totalCommits":5}"#)
        .create_async()
        .await;

    let source = ProxyCommitSource::new(format!("{}/api/commits", server.url()));
    let info = source.fetch("demo-repo").await.unwrap();
    assert_eq!(info.sha, "abc123");
    assert_eq!(info.total_commits, 5);
    mock.assert_async().await;
}

/// Test: non-2xx and malformed bodies are per-resource fetch failures.
#[tokio::test]
async fn test_proxy_fetch_failures() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/commits")
        .match_query(Matcher::UrlEncoded("repo".into(), "down".into()))
        .with_status(502)
        .create_async()
        .await;
    server
        .mock("GET", "/api/commits")
        .match_query(Matcher::UrlEncoded("repo".into(), "garbled".into()))
        .with_status(200)
        .with_body(r#"{"sha":"abc"}"#)
        .create_async()
        .await;

    let source = ProxyCommitSource::new(format!("{}/api/commits", server.url()));
    match source.fetch("down").await {
        Err(FetchError::Status { resource, status }) => {
            assert_eq!(resource, "down");
            assert_eq!(status, 502);
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(matches!(
        source.fetch("garbled").await,
        Err(FetchError::Malformed { .. })
    ));
}

/// Test: connection refused surfaces as an HTTP fetch error.
#[tokio::test]
async fn test_proxy_unreachable() {
    let source = ProxyCommitSource::new("http://127.0.0.1:1/api/commits");
    let err = source.fetch("demo-repo").await.unwrap_err();
    assert!(matches!(err, FetchError::Http { .. }));
    assert_eq!(err.resource(), "demo-repo");
}

/// Test: GitHub source combines the newest commit with the Link-header count.
///
/// Both calls hit the same path; the mock answers each with the commit list
/// and the pagination header.
#[tokio::test]
async fn test_github_fetch_with_link_header() {
    let mut server = mockito::Server::new_async().await;
    let link = format!(
        r#"<{0}/repos/hack-org/demo-repo/commits?per_page=1&page=2>; rel="next", <{0}/repos/hack-org/demo-repo/commits?per_page=1&page=42>; rel="last""#,
        server.url()
    );
    let commits = server
        .mock("GET", "/repos/hack-org/demo-repo/commits")
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer secret")
        .match_header("accept", "application/vnd.github+json")
        .with_status(200)
        .with_header("link", &link)
        .with_body(
            r#"[{"sha":"def456","commit":{"message":"wire up toasts\n\nlong body","author":{"name":"Ana"}},"author":{"login":"ana"}},
                {"sha":"abc123","commit":{"message":"init","author":{"name":"Ana"}},"author":null}]"#,
        )
        .expect(2)
        .create_async()
        .await;

    let source = GitHubCommitSource::new("hack-org", Some("secret".into())).with_api_base(server.url());
    let info = source.fetch("demo-repo").await.unwrap();
    assert_eq!(info.sha, "def456");
    assert_eq!(info.message, "wire up toasts");
    assert_eq!(info.author, "Ana");
    assert_eq!(info.total_commits, 42);
    commits.assert_async().await;
}

/// Test: no Link header means a single page, so one commit.
#[tokio::test]
async fn test_github_fetch_without_link_header() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/repos/hack-org/tiny/commits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"sha":"only","commit":{"message":"first"},"author":{"login":"bo"}}]"#)
        .create_async()
        .await;

    let source = GitHubCommitSource::new("hack-org", None).with_api_base(server.url());
    let info = source.fetch("tiny").await.unwrap();
    assert_eq!(info.total_commits, 1);
    assert_eq!(info.author, "bo");
}

/// Test: an empty repository is malformed rather than a panic.
#[tokio::test]
async fn test_github_empty_repository() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/repos/hack-org/empty/commits")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let source = GitHubCommitSource::new("hack-org", None).with_api_base(server.url());
    assert!(matches!(
        source.fetch("empty").await,
        Err(FetchError::Malformed { .. })
    ));
}

/// Test: control client speaks the control protocol.
#[tokio::test]
async fn test_control_client_round_trip() {
    let mut server = mockito::Server::new_async().await;
    let start = server
        .mock("GET", "/start")
        .with_status(200)
        .with_body(r#"{"endTime":1700000060000,"running":true}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/status")
        .with_status(200)
        .with_body(r#"{"state":"started"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/time")
        .with_status(200)
        .with_body(r#"{"endTime":1700000060000,"running":true}"#)
        .create_async()
        .await;
    let settime = server
        .mock("POST", "/settime")
        .match_body(Matcher::Json(serde_json::json!({"hours": 1, "minutes": 2, "seconds": 3})))
        .with_status(200)
        .with_body(r#"{"endTime":1700003723000,"running":false}"#)
        .create_async()
        .await;

    let client = ControlClient::new(server.url());
    client.start().await.unwrap();
    assert_eq!(client.status().await.unwrap().state, RunState::Started);
    let time = client.time().await.unwrap();
    assert_eq!(time.end_time, Some(1_700_000_060_000));
    client.set_time(1, 2, 3).await.unwrap();
    start.assert_async().await;
    settime.assert_async().await;

    let mut remote = RemoteTimer::new(client, Arc::new(ManualClock::new(1_700_000_000_000)));
    let display = remote.refresh().await.unwrap();
    assert_eq!(display.clock_face(), "0:01:00");
    assert_eq!(display.phase, TimerPhase::Running);
}

/// Test: an unreachable control server reports so.
#[tokio::test]
async fn test_control_server_not_reachable() {
    let mut remote = RemoteTimer::new(
        ControlClient::new("http://127.0.0.1:1"),
        Arc::new(ManualClock::new(0)),
    );
    let err = remote.start().await.unwrap_err();
    assert!(matches!(err, ControlError::Unreachable { .. }));
    assert!(err.to_string().starts_with("control server not reachable"));
    assert!(!remote.display().initialized);
}

/// Test: HTTP errors from the control server are not "unreachable".
#[tokio::test]
async fn test_control_server_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/reset")
        .with_status(500)
        .create_async()
        .await;
    let client = ControlClient::new(server.url());
    assert!(matches!(
        client.reset().await,
        Err(ControlError::Status { status: 500, .. })
    ));
}
