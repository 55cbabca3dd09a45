use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod common;
mod server;

#[derive(Parser)]
#[command(name = "kickoff", version, about = "Hackathon countdown and commit watcher")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Countdown control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Interactive command terminal for the countdown
    Console,
    /// Watch repositories and announce new pushes
    Watch(commands::watch::WatchArgs),
    /// Rank repositories by commit count
    Leaderboard(commands::leaderboard::LeaderboardArgs),
    /// Run the control server
    Serve(commands::serve::ServeArgs),
    /// Drive a countdown hosted by a control server
    Remote {
        /// Control server base URL (defaults to control.url)
        #[arg(long, global = true)]
        url: Option<String>,
        #[command(subcommand)]
        action: commands::remote::RemoteAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kickoff=debug,tower_http=debug"
    } else {
        "kickoff=info"
    };
    let filter = EnvFilter::try_from_env("KICKOFF_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action).await,
        Commands::Console => commands::console::run().await,
        Commands::Watch(args) => commands::watch::run(args).await,
        Commands::Leaderboard(args) => commands::leaderboard::run(args).await,
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Remote { url, action } => commands::remote::run(url, action).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
