use std::sync::Arc;

use clap::Subcommand;
use kickoff_core::console::parse_hms;
use kickoff_core::storage::Config;
use kickoff_core::{ControlClient, RemoteTimer, SystemClock, TimerDisplay};
use serde::Serialize;

use crate::common::{print_json, CliResult};

#[derive(Subcommand)]
pub enum RemoteAction {
    /// Start the server's countdown
    Start,
    /// Re-arm the server's countdown with its default duration
    Reset,
    /// Print whether the server's countdown is running
    Status,
    /// Print the server's end time and the derived display
    Time,
    /// Set the server's countdown to end HH:MM:SS from now
    Settime {
        /// Duration as HH:MM:SS
        time: String,
    },
}

#[derive(Serialize)]
struct RemoteReport {
    server: String,
    clock: String,
    end_time_ms: Option<u64>,
    #[serde(flatten)]
    display: TimerDisplay,
}

pub async fn run(url: Option<String>, action: RemoteAction) -> CliResult {
    let config = Config::load()?;
    let client = ControlClient::new(url.unwrap_or_else(|| config.control.url.clone()));

    let mut remote = RemoteTimer::new(client, Arc::new(SystemClock))
        .with_default_duration(config.timer.default_duration());
    let display = match action {
        RemoteAction::Status => return print_json(&remote.client().status().await?),
        RemoteAction::Start => remote.start().await?,
        RemoteAction::Reset => remote.reset().await?,
        RemoteAction::Time => remote.refresh().await?,
        RemoteAction::Settime { time } => {
            let (hours, minutes, seconds) = parse_hms(&time)?;
            remote.set_time(hours, minutes, seconds).await?
        }
    };

    print_json(&RemoteReport {
        server: remote.client().base_url().to_string(),
        clock: display.clock_face(),
        end_time_ms: remote.last_state().and_then(|s| s.end_timestamp_ms),
        display,
    })
}
