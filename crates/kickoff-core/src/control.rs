//! Control server protocol and client.
//!
//! The control server owns a countdown that several displays follow:
//!
//! | Method | Path       | Body                          | Response               |
//! |--------|------------|-------------------------------|------------------------|
//! | GET    | `/start`   |                               | [`TimeResponse`]       |
//! | GET    | `/reset`   |                               | [`TimeResponse`]       |
//! | GET    | `/status`  |                               | [`StatusResponse`]     |
//! | GET    | `/time`    |                               | [`TimeResponse`]       |
//! | POST   | `/settime` | [`SetTimeRequest`]            | [`TimeResponse`]       |
//!
//! [`RemoteTimer`] is the display-side view: it treats the server as the
//! source of truth instead of local storage.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::Clock;
use crate::error::ControlError;
use crate::timer::{RunState, TimerDisplay, TimerState, DEFAULT_DURATION_MS};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTimeRequest {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: RunState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeResponse {
    /// Epoch ms; `None` while the countdown is uninitialized.
    pub end_time: Option<u64>,
    pub running: bool,
}

impl TimeResponse {
    pub fn to_state(self) -> TimerState {
        TimerState {
            end_timestamp_ms: self.end_time,
            running: self.running,
            duration_ms: None,
        }
    }
}

impl From<TimerState> for TimeResponse {
    fn from(state: TimerState) -> Self {
        Self {
            end_time: state.end_timestamp_ms,
            running: state.running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlClient {
    client: Client,
    base_url: String,
}

impl ControlClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn start(&self) -> Result<(), ControlError> {
        self.get("/start").await.map(drop)
    }

    pub async fn reset(&self) -> Result<(), ControlError> {
        self.get("/reset").await.map(drop)
    }

    pub async fn status(&self) -> Result<StatusResponse, ControlError> {
        let resp = self.get("/status").await?;
        decode("/status", resp).await
    }

    pub async fn time(&self) -> Result<TimeResponse, ControlError> {
        let resp = self.get("/time").await?;
        decode("/time", resp).await
    }

    pub async fn set_time(&self, hours: u64, minutes: u64, seconds: u64) -> Result<(), ControlError> {
        let body = SetTimeRequest {
            hours,
            minutes,
            seconds,
        };
        let url = self.url("/settime");
        debug!(%url, ?body, "control request");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| self.unreachable(source))?;
        check("/settime", resp).map(drop)
    }

    async fn get(&self, endpoint: &str) -> Result<Response, ControlError> {
        let url = self.url(endpoint);
        debug!(%url, "control request");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| self.unreachable(source))?;
        check(endpoint, resp)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    fn unreachable(&self, source: reqwest::Error) -> ControlError {
        ControlError::Unreachable {
            url: self.base_url.clone(),
            source,
        }
    }
}

fn check(endpoint: &str, resp: Response) -> Result<Response, ControlError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(ControlError::Status {
            endpoint: endpoint.to_string(),
            status: resp.status().as_u16(),
        })
    }
}

async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, ControlError> {
    let malformed = |message: String| ControlError::Malformed {
        endpoint: endpoint.to_string(),
        message,
    };
    let body = resp.text().await.map_err(|e| malformed(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| malformed(e.to_string()))
}

/// A countdown whose state lives on the control server.
///
/// Commands go to the server; display values are derived locally from the
/// last `/time` answer, so rendering between refreshes never blocks.
#[derive(Debug, Clone)]
pub struct RemoteTimer {
    client: ControlClient,
    clock: Arc<dyn Clock>,
    default_duration_ms: u64,
    last: Option<TimerState>,
}

impl RemoteTimer {
    pub fn new(client: ControlClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            default_duration_ms: DEFAULT_DURATION_MS,
            last: None,
        }
    }

    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn client(&self) -> &ControlClient {
        &self.client
    }

    /// Re-read the server's countdown.
    pub async fn refresh(&mut self) -> Result<TimerDisplay, ControlError> {
        let time = self.client.time().await?;
        self.last = Some(time.to_state());
        Ok(self.display())
    }

    pub async fn start(&mut self) -> Result<TimerDisplay, ControlError> {
        self.client.start().await?;
        self.refresh().await
    }

    pub async fn reset(&mut self) -> Result<TimerDisplay, ControlError> {
        self.client.reset().await?;
        self.refresh().await
    }

    pub async fn set_time(&mut self, hours: u64, minutes: u64, seconds: u64) -> Result<TimerDisplay, ControlError> {
        self.client.set_time(hours, minutes, seconds).await?;
        self.refresh().await
    }

    /// Values derived from the last known server state. Uninitialized until
    /// the first successful refresh.
    pub fn display(&self) -> TimerDisplay {
        self.last
            .unwrap_or_default()
            .display_at(self.clock.now_ms(), self.default_duration_ms)
    }

    pub fn last_state(&self) -> Option<TimerState> {
        self.last
    }
}
