//! Terminal-style command console.
//!
//! Each line maps to one timer operation and yields the lines to echo back.
//! Input is trimmed and case-insensitive. Bad input never touches the timer.
//!
//! ```text
//! start | pause | reset | settime HH:MM:SS | status | clear | factory-reset
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::events::Event;
use crate::timer::{TimerDisplay, TimerEngine, TimerPhase, TimerService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Reset,
    SetTime {
        hours: u64,
        minutes: u64,
        seconds: u64,
    },
    Status,
    Clear,
    FactoryReset,
}

impl Command {
    pub const NAMES: [&'static str; 7] = [
        "start",
        "pause",
        "reset",
        "settime",
        "status",
        "clear",
        "factory-reset",
    ];
}

impl FromStr for Command {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim().to_lowercase();
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Err(ValidationError::UnknownCommand(String::new()));
        };
        let args: Vec<&str> = parts.collect();

        let command = match name {
            "start" => Command::Start,
            "pause" => Command::Pause,
            "reset" => Command::Reset,
            "status" => Command::Status,
            "clear" => Command::Clear,
            "factory-reset" => Command::FactoryReset,
            "settime" => {
                let [value] = args.as_slice() else {
                    return Err(ValidationError::invalid("settime", "usage: settime HH:MM:SS"));
                };
                let (hours, minutes, seconds) = parse_hms(value)?;
                return Ok(Command::SetTime {
                    hours,
                    minutes,
                    seconds,
                });
            }
            other => return Err(ValidationError::UnknownCommand(other.to_string())),
        };

        if !args.is_empty() {
            return Err(ValidationError::invalid(name, "takes no arguments"));
        }
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => f.write_str("start"),
            Command::Pause => f.write_str("pause"),
            Command::Reset => f.write_str("reset"),
            Command::SetTime {
                hours,
                minutes,
                seconds,
            } => write!(f, "settime {hours:02}:{minutes:02}:{seconds:02}"),
            Command::Status => f.write_str("status"),
            Command::Clear => f.write_str("clear"),
            Command::FactoryReset => f.write_str("factory-reset"),
        }
    }
}

/// Parse `HH:MM:SS` into non-negative components.
///
/// Components are not range-limited: `0:90:00` is ninety minutes.
pub fn parse_hms(input: &str) -> Result<(u64, u64, u64), ValidationError> {
    let parts: Vec<&str> = input.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(ValidationError::invalid(
            "settime",
            format!("expected HH:MM:SS, got '{}'", input.trim()),
        ));
    };
    Ok((
        parse_component("hours", h)?,
        parse_component("minutes", m)?,
        parse_component("seconds", s)?,
    ))
}

fn parse_component(field: &str, raw: &str) -> Result<u64, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::invalid(field, "missing value"));
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::invalid(
            field,
            format!("'{raw}' is not a non-negative integer"),
        ));
    }
    raw.parse::<u64>()
        .map_err(|_| ValidationError::invalid(field, format!("'{raw}' is out of range")))
}

/// What the display layer should do after a line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsoleOutput {
    pub lines: Vec<String>,
    /// Wipe the console before printing `lines`.
    pub clear: bool,
    pub event: Option<Event>,
}

impl ConsoleOutput {
    fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.lines.iter().any(|l| l.starts_with("> ERROR"))
    }
}

/// Run one console line against the engine.
pub fn run_line(engine: &mut TimerEngine, line: &str) -> ConsoleOutput {
    if line.trim().is_empty() {
        return ConsoleOutput::default();
    }
    match line.parse::<Command>() {
        Ok(command) => execute(engine, command),
        Err(e) => ConsoleOutput::lines(vec![format!("> ERROR: {e}")]),
    }
}

/// Run one console line through a service, publishing the resulting event.
pub fn run_line_on(service: &TimerService, line: &str) -> ConsoleOutput {
    let output = service.with_engine_mut(|engine| run_line(engine, line));
    if let Some(event) = &output.event {
        service.publish(event.clone());
    }
    output
}

pub fn execute(engine: &mut TimerEngine, command: Command) -> ConsoleOutput {
    let mut lines = vec![format!("> COMMAND ACCEPTED: {command}")];
    let mut output = ConsoleOutput::default();

    match command {
        Command::Start => match engine.start() {
            Some(event) => {
                lines.push(format!(
                    "> Countdown running. {} remaining.",
                    engine.display().clock_face()
                ));
                output.event = Some(event);
            }
            None => lines.push("> Countdown already running.".to_string()),
        },
        Command::Pause => match engine.pause() {
            Some(event @ Event::TimerExpired { .. }) => {
                lines.push("> Countdown already reached 0:00:00.".to_string());
                output.event = Some(event);
            }
            Some(event) => {
                lines.push(format!(
                    "> Countdown paused at {}.",
                    engine.display().clock_face()
                ));
                output.event = Some(event);
            }
            None => lines.push(not_initialized()),
        },
        Command::Reset => match engine.reset() {
            Some(event) => {
                lines.push(format!(
                    "> Countdown reset to {}.",
                    engine.display().clock_face()
                ));
                output.event = Some(event);
            }
            None => lines.push(not_initialized()),
        },
        Command::SetTime {
            hours,
            minutes,
            seconds,
        } => match engine.set_time(hours, minutes, seconds) {
            Ok(event) => {
                lines.push(format!(
                    "> Countdown set to {}.",
                    engine.display().clock_face()
                ));
                output.event = Some(event);
            }
            Err(e) => lines = vec![format!("> ERROR: {e}")],
        },
        Command::Status => {
            lines.push(status_line(&engine.display()));
            if engine.is_degraded() {
                lines.push("> WARNING: storage unavailable, state is not persisted.".to_string());
            }
        }
        Command::Clear => {
            output.clear = true;
            lines.clear();
        }
        Command::FactoryReset => {
            output.event = Some(engine.hard_reset());
            lines.push("> Factory reset complete. Countdown cleared.".to_string());
        }
    }

    output.lines = lines;
    output
}

fn not_initialized() -> String {
    "> Countdown not initialized. Type 'start' first.".to_string()
}

pub fn status_line(display: &TimerDisplay) -> String {
    match display.phase {
        TimerPhase::Uninitialized => "> STATUS: NOT INITIALIZED | 0:00:00".to_string(),
        TimerPhase::Expired => "> STATUS: EXPIRED | 0:00:00".to_string(),
        phase => format!(
            "> STATUS: {} | {} remaining | {:.0}% elapsed",
            if phase == TimerPhase::Running { "RUNNING" } else { "PAUSED" },
            display.clock_face(),
            display.progress * 100.0
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn engine() -> TimerEngine {
        TimerEngine::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(0)))
    }

    #[test]
    fn parses_commands_case_insensitively() {
        assert_eq!("  START ".parse::<Command>().unwrap(), Command::Start);
        assert_eq!("Factory-Reset".parse::<Command>().unwrap(), Command::FactoryReset);
        assert_eq!(
            "settime 01:02:03".parse::<Command>().unwrap(),
            Command::SetTime {
                hours: 1,
                minutes: 2,
                seconds: 3
            }
        );
    }

    #[test]
    fn parse_hms_rejects_malformed_input() {
        assert!(parse_hms("1:2").is_err());
        assert!(parse_hms("1:2:3:4").is_err());
        assert!(parse_hms("aa:00:00").is_err());
        assert!(parse_hms("-1:00:00").is_err());
        assert!(parse_hms("1::00").is_err());
        assert!(parse_hms("99999999999999999999:00:00").is_err());
        assert_eq!(parse_hms("0:90:00").unwrap(), (0, 90, 0));
    }

    #[test]
    fn unknown_command_is_an_inline_error() {
        let mut engine = engine();
        let out = run_line(&mut engine, "launch");
        assert!(out.is_error());
        assert_eq!(out.lines, vec!["> ERROR: Unknown command: launch"]);
        assert!(out.event.is_none());
    }

    #[test]
    fn malformed_settime_leaves_state_unchanged() {
        let mut engine = engine();
        run_line(&mut engine, "settime 00:10:00");
        let before = engine.state();

        let out = run_line(&mut engine, "settime 00:xx:00");
        assert!(out.is_error());
        assert_eq!(engine.state(), before);

        let out = run_line(&mut engine, "settime");
        assert!(out.is_error());
        assert_eq!(engine.state(), before);
    }

    #[test]
    fn start_then_status() {
        let mut engine = engine();
        let out = run_line(&mut engine, "start");
        assert_eq!(out.lines[0], "> COMMAND ACCEPTED: start");
        assert_eq!(out.lines[1], "> Countdown running. 24:00:00 remaining.");
        assert!(matches!(out.event, Some(Event::TimerStarted { .. })));

        let out = run_line(&mut engine, "status");
        assert_eq!(out.lines[1], "> STATUS: RUNNING | 24:00:00 remaining | 0% elapsed");
    }

    #[test]
    fn pause_before_start_reports_not_initialized() {
        let mut engine = engine();
        let out = run_line(&mut engine, "pause");
        assert_eq!(out.lines[1], "> Countdown not initialized. Type 'start' first.");
        assert!(out.event.is_none());
    }

    #[test]
    fn pause_after_zero_reports_expiry() {
        let clock = ManualClock::new(0);
        let mut engine = TimerEngine::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
        run_line(&mut engine, "settime 0:0:2");
        run_line(&mut engine, "start");
        clock.advance(std::time::Duration::from_secs(3));

        let out = run_line(&mut engine, "pause");
        assert_eq!(out.lines[1], "> Countdown already reached 0:00:00.");
        assert!(matches!(out.event, Some(Event::TimerExpired { .. })));
    }

    #[test]
    fn settime_echoes_clock_face() {
        let mut engine = engine();
        let out = run_line(&mut engine, "settime 1:02:03");
        assert_eq!(out.lines[0], "> COMMAND ACCEPTED: settime 01:02:03");
        assert_eq!(out.lines[1], "> Countdown set to 1:02:03.");
    }

    #[test]
    fn clear_and_factory_reset() {
        let mut engine = engine();
        run_line(&mut engine, "start");

        let out = run_line(&mut engine, "clear");
        assert!(out.clear);
        assert!(out.lines.is_empty());

        let out = run_line(&mut engine, "factory-reset");
        assert!(matches!(out.event, Some(Event::TimerCleared { .. })));
        assert!(!engine.is_initialized());
        assert_eq!(
            run_line(&mut engine, "status").lines[1],
            "> STATUS: NOT INITIALIZED | 0:00:00"
        );
    }

    #[test]
    fn blank_line_does_nothing() {
        let mut engine = engine();
        assert_eq!(run_line(&mut engine, "   "), ConsoleOutput::default());
    }
}
