use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerPhase;

/// Every state change in the system produces an Event.
/// The display layer renders them; the control server logs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Countdown is running. `armed` is set when this start also created
    /// the end timestamp.
    TimerStarted {
        end_time_ms: u64,
        remaining_ms: u64,
        armed: bool,
        at: DateTime<Utc>,
    },
    TimerPaused {
        end_time_ms: u64,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    /// Re-armed with the default duration, not running.
    TimerReset {
        end_time_ms: u64,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    /// Re-armed with an explicit duration, not running.
    TimerTimeSet {
        end_time_ms: u64,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    /// Remaining time reached zero while running. Emitted once per arm.
    TimerExpired {
        end_time_ms: u64,
        at: DateTime<Utc>,
    },
    /// All persisted timer state was removed.
    TimerCleared {
        at: DateTime<Utc>,
    },
    /// Persisted state was changed by another engine and re-read.
    TimerSynced {
        end_time_ms: Option<u64>,
        running: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: TimerPhase,
        end_time_ms: Option<u64>,
        remaining_ms: u64,
        running: bool,
        progress: f64,
        at: DateTime<Utc>,
    },
    /// A watched repository received new commits.
    CommitDetected {
        resource_id: String,
        author: String,
        message_summary: String,
        total_count: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::TimerStarted { at, .. }
            | Event::TimerPaused { at, .. }
            | Event::TimerReset { at, .. }
            | Event::TimerTimeSet { at, .. }
            | Event::TimerExpired { at, .. }
            | Event::TimerCleared { at }
            | Event::TimerSynced { at, .. }
            | Event::StateSnapshot { at, .. }
            | Event::CommitDetected { at, .. } => *at,
        }
    }
}
