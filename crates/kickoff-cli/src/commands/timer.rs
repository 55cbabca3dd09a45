use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use kickoff_core::console::parse_hms;
use kickoff_core::storage::Config;
use kickoff_core::{Event, TimerDisplay, TimerEngine, TimerPhase, TimerService, TokioScheduler};
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::info;

use crate::common::{open_engine, print_json, shutdown_signal, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the countdown (arms the default duration on first use)
    Start,
    /// Pause the countdown, keeping its end time
    Pause,
    /// Re-arm with the default duration, paused
    Reset,
    /// Re-arm to end HH:MM:SS from now, paused
    Settime {
        /// Duration as HH:MM:SS
        time: String,
    },
    /// Print current countdown state as JSON
    Status,
    /// Wipe all persisted countdown state
    FactoryReset,
    /// Show the countdown, updating every second, until Ctrl-C
    Live,
}

/// `status` output: display values plus what is persisted.
#[derive(Serialize)]
pub struct StatusReport {
    pub clock: String,
    #[serde(flatten)]
    pub display: TimerDisplay,
    pub end_time_ms: Option<u64>,
    pub degraded: bool,
}

impl StatusReport {
    pub fn of(engine: &TimerEngine) -> Self {
        let display = engine.display();
        Self {
            clock: display.clock_face(),
            display,
            end_time_ms: engine.state().end_timestamp_ms,
            degraded: engine.is_degraded(),
        }
    }
}

pub async fn run(action: TimerAction) -> CliResult {
    let config = Config::load()?;
    let mut engine = open_engine(&config);

    let event = match action {
        TimerAction::Start => engine.start(),
        TimerAction::Pause => engine.pause(),
        TimerAction::Reset => engine.reset(),
        TimerAction::Settime { time } => {
            let (hours, minutes, seconds) = parse_hms(&time)?;
            Some(engine.set_time(hours, minutes, seconds)?)
        }
        TimerAction::Status => {
            // Persist an expiry that happened while nothing was ticking.
            if let Some(Event::TimerExpired { end_time_ms, .. }) = engine.tick() {
                info!(end_time_ms, "countdown expired since last check");
            }
            return print_json(&StatusReport::of(&engine));
        }
        TimerAction::FactoryReset => Some(engine.hard_reset()),
        TimerAction::Live => return live(engine).await,
    };

    match event {
        Some(event) => print_json(&event),
        None => print_json(&engine.snapshot()),
    }
}

async fn live(engine: TimerEngine) -> CliResult {
    let service = TimerService::new(engine, Arc::new(TokioScheduler));
    let mut events = service.subscribe();
    service.start();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut frame = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = frame.tick() => {}
            _ = &mut shutdown => break,
        }

        loop {
            match events.try_recv() {
                Ok(Event::TimerExpired { .. }) => {
                    println!("\r> TIME'S UP            ");
                }
                Ok(event) => info!(?event, "timer event"),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        let display = service.with_engine(TimerEngine::display);
        let label = match display.phase {
            TimerPhase::Uninitialized => "not started",
            TimerPhase::Armed => "paused",
            TimerPhase::Running => "running",
            TimerPhase::Expired => "expired",
        };
        print!("\r{}  {:>3.0}%  {label:<12}", display.clock_face(), display.progress * 100.0);
        std::io::stdout().flush()?;
    }

    service.stop();
    println!();
    Ok(())
}
