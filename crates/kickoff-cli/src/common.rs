//! Helpers shared by the subcommands.

use std::sync::Arc;

use kickoff_core::sources::{GitHubCommitSource, ProxyCommitSource};
use kickoff_core::storage::{Config, KvStore, MemoryStore, SqliteStore};
use kickoff_core::{SystemClock, TimerEngine};
use serde::Serialize;
use tracing::warn;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// The on-disk store, or an in-memory one when the database cannot be
/// opened. The timer keeps working either way; nothing is persisted in the
/// second case.
pub fn open_store() -> Arc<dyn KvStore> {
    match SqliteStore::open() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "storage unavailable, timer state will not be persisted");
            Arc::new(MemoryStore::new())
        }
    }
}

pub fn open_engine(config: &Config) -> TimerEngine {
    TimerEngine::new(open_store(), Arc::new(SystemClock))
        .with_default_duration(config.timer.default_duration())
}

/// Source that queries GitHub directly with the configured org and token.
pub fn github_source(config: &Config) -> Result<GitHubCommitSource, Box<dyn std::error::Error>> {
    let github = &config.github;
    if github.org.trim().is_empty() {
        return Err("github.org is not set (kickoff config set github.org <org>)".into());
    }
    Ok(GitHubCommitSource::new(github.org.clone(), github.token()).with_api_base(github.api_base.clone()))
}

pub fn proxy_source(config: &Config) -> ProxyCommitSource {
    ProxyCommitSource::new(config.watcher.endpoint.clone())
}

/// Repositories to watch: the command line wins over `watcher.repos`.
pub fn resolve_repos(config: &Config, cli_repos: Vec<String>) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let repos = if cli_repos.is_empty() {
        config.watcher.repos.clone()
    } else {
        cli_repos
    };
    if repos.is_empty() {
        return Err("no repositories to watch (pass --repo or set watcher.repos)".into());
    }
    Ok(repos)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolves once Ctrl-C is pressed. A failure to install the handler
/// resolves immediately.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
    }
}
