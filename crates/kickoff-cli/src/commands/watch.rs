use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use kickoff_core::storage::Config;
use kickoff_core::{CommitSource, CommitWatcher, SystemClock, TokioScheduler, WatcherService};

use crate::common::{github_source, print_json, proxy_source, resolve_repos, shutdown_signal, CliResult};

#[derive(Args)]
pub struct WatchArgs {
    /// Repository to watch (repeatable; defaults to watcher.repos)
    #[arg(short, long = "repo")]
    pub repos: Vec<String>,
    /// Query GitHub directly instead of the commit-info endpoint
    #[arg(long)]
    pub direct: bool,
    /// Poll interval in seconds (defaults to watcher.interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,
    /// Poll once and print what was seen
    #[arg(long)]
    pub once: bool,
}

pub async fn run(args: WatchArgs) -> CliResult {
    let config = Config::load()?;
    let repos = resolve_repos(&config, args.repos.clone())?;
    if args.direct {
        watch_with(github_source(&config)?, repos, &args, &config).await
    } else {
        watch_with(proxy_source(&config), repos, &args, &config).await
    }
}

async fn watch_with<S>(source: S, repos: Vec<String>, args: &WatchArgs, config: &Config) -> CliResult
where
    S: CommitSource + 'static,
{
    let watcher = Arc::new(CommitWatcher::new(source, repos, Arc::new(SystemClock)));
    if args.once {
        let report = watcher.poll_once().await;
        return print_json(&report);
    }

    let interval = args
        .interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.watcher.interval());
    let toast = config.watcher.toast_duration();

    let service = WatcherService::new(Arc::clone(&watcher), Arc::new(TokioScheduler), interval);
    let mut active = watcher.subscribe_active();
    service.start();
    eprintln!(
        "watching {} repositories every {}s (Ctrl-C to stop)",
        watcher.resources().len(),
        interval.as_secs()
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let current = active.borrow_and_update().clone();
        match current {
            Some(entry) => {
                println!("🚀 New push detected: {} ({} commits)", entry.resource_id, entry.total_count);
                println!("   {}", entry.description());
                tokio::select! {
                    _ = tokio::time::sleep(toast) => {
                        watcher.acknowledge();
                    }
                    _ = &mut shutdown => break,
                }
            }
            None => {
                tokio::select! {
                    changed = active.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = &mut shutdown => break,
                }
            }
        }
    }

    service.stop();
    Ok(())
}
