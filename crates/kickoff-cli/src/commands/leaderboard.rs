use std::sync::Arc;

use clap::Args;
use kickoff_core::storage::Config;
use kickoff_core::{CommitSource, CommitWatcher, LeaderboardRow, SystemClock};

use crate::common::{github_source, print_json, proxy_source, resolve_repos, CliResult};

const BAR_WIDTH: usize = 30;

#[derive(Args)]
pub struct LeaderboardArgs {
    /// Repository to rank (repeatable; defaults to watcher.repos)
    #[arg(short, long = "repo")]
    pub repos: Vec<String>,
    /// Query GitHub directly instead of the commit-info endpoint
    #[arg(long)]
    pub direct: bool,
    /// Print rows as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: LeaderboardArgs) -> CliResult {
    let config = Config::load()?;
    let repos = resolve_repos(&config, args.repos)?;
    let rows = if args.direct {
        collect(github_source(&config)?, repos).await
    } else {
        collect(proxy_source(&config), repos).await
    };

    if args.json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No commit counts available.");
        return Ok(());
    }
    let name_width = rows.iter().map(|r| r.resource_id.len()).max().unwrap_or(0);
    for row in &rows {
        println!("{}", format_row(row, name_width));
    }
    Ok(())
}

async fn collect<S: CommitSource>(source: S, repos: Vec<String>) -> Vec<LeaderboardRow> {
    let watcher = CommitWatcher::new(source, repos, Arc::new(SystemClock));
    watcher.poll_once().await;
    watcher.leaderboard().ranked()
}

fn format_row(row: &LeaderboardRow, name_width: usize) -> String {
    let filled = (row.fraction * BAR_WIDTH as f64).round() as usize;
    format!(
        "{:>2}. {:<name_width$}  {:<bar_width$}  {}",
        row.rank,
        row.resource_id,
        "█".repeat(filled.min(BAR_WIDTH)),
        row.count,
        bar_width = BAR_WIDTH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: the leader gets a full bar, others a proportional one.
    #[test]
    fn test_format_row_bar_length() {
        let leader = LeaderboardRow {
            rank: 1,
            resource_id: "alpha".into(),
            count: 10,
            fraction: 1.0,
        };
        let half = LeaderboardRow {
            rank: 2,
            resource_id: "beta".into(),
            count: 5,
            fraction: 0.5,
        };
        assert_eq!(format_row(&leader, 5).matches('█').count(), BAR_WIDTH);
        assert_eq!(format_row(&half, 5).matches('█').count(), BAR_WIDTH / 2);
        assert!(format_row(&half, 5).starts_with(" 2. beta "));
        assert!(format_row(&half, 5).ends_with(" 5"));
    }
}
