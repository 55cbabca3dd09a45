//! Persisted countdown state and the values derived from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{StorageError, ValidationError};
use crate::storage::KvStore;

pub const KEY_END_TIME: &str = "hackathonEndTime";
pub const KEY_STATE: &str = "hackathonState";
pub const KEY_DURATION: &str = "hackathonDuration";

/// Keys owned by the timer. Changes to any other key are ignored.
pub const TIMER_KEYS: [&str; 3] = [KEY_END_TIME, KEY_STATE, KEY_DURATION];

pub const DEFAULT_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

/// Value stored under `hackathonState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Started,
    Idle,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Started => "started",
            RunState::Idle => "idle",
        }
    }
}

impl From<bool> for RunState {
    fn from(running: bool) -> Self {
        if running {
            RunState::Started
        } else {
            RunState::Idle
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(RunState::Started),
            "idle" => Ok(RunState::Idle),
            other => Err(ValidationError::invalid(
                KEY_STATE,
                format!("expected 'started' or 'idle', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    /// No end timestamp has ever been set (or it was wiped).
    Uninitialized,
    /// End timestamp set, not running.
    Armed,
    Running,
    /// Remaining time is zero.
    Expired,
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimerPhase::Uninitialized => "uninitialized",
            TimerPhase::Armed => "armed",
            TimerPhase::Running => "running",
            TimerPhase::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// The persisted part of the countdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    /// Absolute end of the countdown, epoch ms. `None` = uninitialized.
    pub end_timestamp_ms: Option<u64>,
    pub running: bool,
    /// Length of the countdown as armed, for progress.
    pub duration_ms: Option<u64>,
}

impl TimerState {
    pub fn is_initialized(&self) -> bool {
        self.end_timestamp_ms.is_some()
    }

    pub fn remaining_at(&self, now_ms: u64) -> u64 {
        self.end_timestamp_ms
            .map(|end| end.saturating_sub(now_ms))
            .unwrap_or(0)
    }

    pub fn phase_at(&self, now_ms: u64) -> TimerPhase {
        match self.end_timestamp_ms {
            None => TimerPhase::Uninitialized,
            Some(end) if end <= now_ms => TimerPhase::Expired,
            Some(_) if self.running => TimerPhase::Running,
            Some(_) => TimerPhase::Armed,
        }
    }

    /// Derive the display values at `now_ms`. `default_duration_ms` stands in
    /// for a missing `duration_ms` (state written before it was persisted).
    pub fn display_at(&self, now_ms: u64, default_duration_ms: u64) -> TimerDisplay {
        let remaining_ms = self.remaining_at(now_ms);
        // A partial second still shows as a full one, so a countdown set to
        // 1:02:03 reads 1:02:03 until a whole second has passed.
        let total_secs = remaining_ms.div_ceil(1000);

        let progress = if self.is_initialized() {
            let duration = self.duration_ms.unwrap_or(default_duration_ms);
            if duration == 0 {
                1.0
            } else {
                let elapsed = duration.saturating_sub(remaining_ms);
                (elapsed as f64 / duration as f64).clamp(0.0, 1.0)
            }
        } else {
            0.0
        };

        TimerDisplay {
            hours: total_secs / 3600,
            minutes: ((total_secs % 3600) / 60) as u8,
            seconds: (total_secs % 60) as u8,
            remaining_ms,
            progress,
            running: self.running,
            initialized: self.is_initialized(),
            phase: self.phase_at(now_ms),
        }
    }

    /// Read the persisted keys. Unparsable values are treated as absent.
    pub fn load(store: &dyn KvStore) -> Result<Self, StorageError> {
        let end_timestamp_ms = parse_ms(store, KEY_END_TIME)?;
        let running = match store.get(KEY_STATE)? {
            Some(raw) => match raw.parse::<RunState>() {
                Ok(state) => state == RunState::Started,
                Err(e) => {
                    warn!(error = %e, "ignoring persisted run state");
                    false
                }
            },
            None => false,
        };
        let duration_ms = parse_ms(store, KEY_DURATION)?;
        Ok(Self {
            end_timestamp_ms,
            running,
            duration_ms,
        })
    }

    /// Write every key, removing the ones that are unset.
    pub fn save(&self, store: &dyn KvStore) -> Result<(), StorageError> {
        match self.end_timestamp_ms {
            Some(end) => store.set(KEY_END_TIME, &end.to_string())?,
            None => store.remove(KEY_END_TIME)?,
        }
        match self.duration_ms {
            Some(duration) => store.set(KEY_DURATION, &duration.to_string())?,
            None => store.remove(KEY_DURATION)?,
        }
        if self.is_initialized() {
            store.set(KEY_STATE, RunState::from(self.running).as_str())
        } else {
            store.remove(KEY_STATE)
        }
    }
}

fn parse_ms(store: &dyn KvStore, key: &str) -> Result<Option<u64>, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) => Ok(Some(ms)),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable persisted value");
            Ok(None)
        }
    }
}

/// Values a display layer renders for the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimerDisplay {
    pub hours: u64,
    pub minutes: u8,
    pub seconds: u8,
    pub remaining_ms: u64,
    /// Elapsed fraction of the armed duration, 0.0 ..= 1.0.
    pub progress: f64,
    pub running: bool,
    pub initialized: bool,
    pub phase: TimerPhase,
}

impl TimerDisplay {
    /// `H:MM:SS`, hours unpadded.
    pub fn clock_face(&self) -> String {
        format!("{}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

impl fmt::Display for TimerDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.clock_face(), self.phase)
    }
}

/// `(h*3600 + m*60 + s) * 1000`, rejecting overflow.
pub fn countdown_ms(hours: u64, minutes: u64, seconds: u64) -> Result<u64, ValidationError> {
    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .and_then(|total| total.checked_mul(1000))
        .ok_or_else(|| ValidationError::invalid("duration", "countdown is too long"))
}
