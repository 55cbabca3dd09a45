//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `tick()` periodically.
//! Every command persists the new state through the injected [`KvStore`], so a
//! restarted process (or a second engine on the same store) sees the same
//! countdown.
//!
//! ## State Transitions
//!
//! ```text
//! Uninitialized -> Armed <-> Running -> Expired
//!                    ^                     |
//!                    +-- reset / settime --+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(store, Arc::new(SystemClock));
//! engine.start();
//! // In a loop:
//! engine.tick(); // Returns Some(Event::TimerExpired) once at zero
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::state::{countdown_ms, TimerDisplay, TimerPhase, TimerState, DEFAULT_DURATION_MS, TIMER_KEYS};
use crate::clock::Clock;
use crate::error::{StorageError, ValidationError};
use crate::events::Event;
use crate::storage::{KvStore, MemoryStore, StoreChange};

/// Core timer engine.
pub struct TimerEngine {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    state: TimerState,
    default_duration_ms: u64,
    /// Set once the backing store failed; the session continues in memory.
    degraded: bool,
}

impl TimerEngine {
    /// Create an engine over `store`, restoring any persisted countdown.
    ///
    /// A store that cannot be read degrades the engine to in-memory
    /// operation instead of failing.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        let mut engine = Self {
            store,
            clock,
            state: TimerState::default(),
            default_duration_ms: DEFAULT_DURATION_MS,
            degraded: false,
        };
        engine.reload();
        engine
    }

    /// Override the duration armed by `start` and `reset`.
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration_ms = duration.as_millis() as u64;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.state.phase_at(self.clock.now_ms())
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn default_duration_ms(&self) -> u64 {
        self.default_duration_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.state.remaining_at(self.clock.now_ms())
    }

    /// Hours, minutes, seconds and progress as of now.
    pub fn display(&self) -> TimerDisplay {
        self.state
            .display_at(self.clock.now_ms(), self.default_duration_ms)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let display = self.display();
        Event::StateSnapshot {
            phase: display.phase,
            end_time_ms: self.state.end_timestamp_ms,
            remaining_ms: display.remaining_ms,
            running: display.running,
            progress: display.progress,
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start (or resume) the countdown.
    ///
    /// The first start arms `now + default duration`. Later starts keep the
    /// existing end timestamp; an expired countdown is re-armed.
    pub fn start(&mut self) -> Option<Event> {
        let now = self.clock.now_ms();
        let armed = match self.state.phase_at(now) {
            TimerPhase::Running => return None,
            TimerPhase::Uninitialized | TimerPhase::Expired => {
                self.arm(now, self.default_duration_ms);
                true
            }
            TimerPhase::Armed => false,
        };
        self.state.running = true;
        self.persist();

        let end_time_ms = self.state.end_timestamp_ms.unwrap_or(now);
        info!(end_time_ms, armed, "countdown started");
        Some(Event::TimerStarted {
            end_time_ms,
            remaining_ms: self.state.remaining_at(now),
            armed,
            at: self.clock.now(),
        })
    }

    /// Stop ticking. The end timestamp is kept.
    ///
    /// Pausing a running countdown that already reached zero reports the
    /// expiry instead.
    pub fn pause(&mut self) -> Option<Event> {
        let end_time_ms = self.state.end_timestamp_ms?;
        if self.state.running && self.state.phase_at(self.clock.now_ms()) == TimerPhase::Expired {
            return self.tick();
        }
        let was_running = self.state.running;
        self.state.running = false;
        self.persist();

        if was_running {
            info!(end_time_ms, "countdown paused");
        }
        Some(Event::TimerPaused {
            end_time_ms,
            remaining_ms: self.remaining_ms(),
            at: self.clock.now(),
        })
    }

    /// Re-arm with the default duration, not running. No-op when the
    /// countdown was never initialized.
    pub fn reset(&mut self) -> Option<Event> {
        if !self.state.is_initialized() {
            debug!("reset ignored: countdown not initialized");
            return None;
        }
        let now = self.clock.now_ms();
        self.arm(now, self.default_duration_ms);
        self.state.running = false;
        self.persist();

        let end_time_ms = self.state.end_timestamp_ms.unwrap_or(now);
        info!(end_time_ms, "countdown reset");
        Some(Event::TimerReset {
            end_time_ms,
            duration_ms: self.default_duration_ms,
            at: self.clock.now(),
        })
    }

    /// Re-arm to end `h:m:s` from now, not running.
    pub fn set_time(&mut self, hours: u64, minutes: u64, seconds: u64) -> Result<Event, ValidationError> {
        let duration_ms = countdown_ms(hours, minutes, seconds)?;
        let now = self.clock.now_ms();
        let end_time_ms = now
            .checked_add(duration_ms)
            .ok_or_else(|| ValidationError::invalid("duration", "countdown is too long"))?;

        self.arm(now, duration_ms);
        self.state.running = false;
        self.persist();

        info!(end_time_ms, duration_ms, "countdown time set");
        Ok(Event::TimerTimeSet {
            end_time_ms,
            duration_ms,
            at: self.clock.now(),
        })
    }

    /// Remove every persisted key and return to uninitialized.
    pub fn hard_reset(&mut self) -> Event {
        self.state = TimerState::default();
        self.persist();
        info!("countdown cleared");
        Event::TimerCleared {
            at: self.clock.now(),
        }
    }

    /// Called periodically by the owner. Returns `TimerExpired` on the tick
    /// that observes zero remaining; the engine is idle afterwards.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.state.running {
            return None;
        }
        let end_time_ms = self.state.end_timestamp_ms?;
        let remaining = self.remaining_ms();
        if remaining > 0 {
            return None;
        }

        self.state.running = false;
        self.persist();
        info!(end_time_ms, "countdown expired");
        Some(Event::TimerExpired {
            end_time_ms,
            at: self.clock.now(),
        })
    }

    // ── Cross-context sync ───────────────────────────────────────────

    /// Re-read the persisted state.
    pub fn reload(&mut self) {
        match TimerState::load(self.store.as_ref()) {
            Ok(state) => self.state = state,
            Err(e) => self.degrade(e),
        }
    }

    /// React to a write seen on the store. Returns `TimerSynced` when the
    /// write was to a timer key and changed this engine's view.
    pub fn apply_change(&mut self, change: &StoreChange) -> Option<Event> {
        if !TIMER_KEYS.contains(&change.key.as_str()) {
            return None;
        }
        let before = self.state;
        self.reload();
        if self.state == before {
            return None;
        }
        debug!(key = %change.key, "timer state changed elsewhere");
        Some(Event::TimerSynced {
            end_time_ms: self.state.end_timestamp_ms,
            running: self.state.running,
            at: self.clock.now(),
        })
    }

    /// Ask the store to publish writes made by other processes.
    pub fn poll_store(&mut self) {
        if let Err(e) = self.store.poll_external_changes() {
            self.degrade(e);
        }
    }

    /// Subscribe to the store this engine writes to.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn arm(&mut self, now: u64, duration_ms: u64) {
        self.state.end_timestamp_ms = Some(now.saturating_add(duration_ms));
        self.state.duration_ms = Some(duration_ms);
    }

    fn persist(&mut self) {
        if let Err(e) = self.state.save(self.store.as_ref()) {
            self.degrade(e);
        }
    }

    /// Swap in a memory store seeded with the live state, so later reloads
    /// within the session keep the countdown.
    fn degrade(&mut self, err: StorageError) {
        if self.degraded {
            return;
        }
        warn!(error = %err, "timer storage unavailable, continuing in memory");
        let store = Arc::new(MemoryStore::new());
        // The in-memory store cannot fail.
        let _ = self.state.save(store.as_ref());
        self.store = store;
        self.degraded = true;
    }
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("state", &self.state)
            .field("default_duration_ms", &self.default_duration_ms)
            .field("degraded", &self.degraded)
            .finish()
    }
}
