use std::sync::Arc;

use clap::Args;
use kickoff_core::storage::Config;
use kickoff_core::{Event, TimerService, TokioScheduler};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

use crate::common::{github_source, open_engine, shutdown_signal, CliResult};
use crate::server::{create_router, AppState};

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address (defaults to control.bind)
    #[arg(long)]
    pub bind: Option<String>,
}

pub async fn run(args: ServeArgs) -> CliResult {
    let config = Config::load()?;
    let bind = args.bind.unwrap_or_else(|| config.control.bind.clone());

    let commits = match github_source(&config) {
        Ok(source) => Some(source),
        Err(e) => {
            info!("commit proxy disabled: {e}");
            None
        }
    };

    let timer = TimerService::new(open_engine(&config), Arc::new(TokioScheduler));
    let mut events = timer.subscribe();
    timer.start();
    let state = Arc::new(AppState { timer, commits });

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::TimerExpired { end_time_ms, .. }) => {
                    info!(end_time_ms, "countdown expired");
                }
                Ok(event) => info!(event = ?event, "timer event"),
                Err(RecvError::Lagged(skipped)) => info!(skipped, "event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(bind.as_str()).await?;
    info!("control server listening on {bind}");
    println!("kickoff control server listening on http://{bind}");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("server error: {e}");
                return Err(e.into());
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    state.timer.stop();
    Ok(())
}
