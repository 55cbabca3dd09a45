use std::sync::Arc;

use kickoff_core::console::{run_line_on, Command};
use kickoff_core::storage::Config;
use kickoff_core::{Event, TimerService, TokioScheduler};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::common::{open_engine, CliResult};

const BANNER: &[&str] = &[
    "> HACKATHON COMMAND TERMINAL",
    "> Type a command and press enter.",
];

pub async fn run() -> CliResult {
    let config = Config::load()?;
    let service = TimerService::new(open_engine(&config), Arc::new(TokioScheduler));
    let mut events = service.subscribe();
    service.start();

    print_banner();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let output = run_line_on(&service, &line);
                if output.clear {
                    print!("\x1b[2J\x1b[H");
                    print_banner();
                }
                for line in &output.lines {
                    println!("{line}");
                }
            }
            event = events.recv() => match event {
                Ok(Event::TimerExpired { .. }) => println!("> TIME'S UP. Countdown complete."),
                Ok(Event::TimerSynced { .. }) => {
                    println!("> Countdown updated by another session.");
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    service.stop();
    Ok(())
}

fn print_banner() {
    for line in BANNER {
        println!("{line}");
    }
    println!("> Commands: {}", Command::NAMES.join(", "));
}
