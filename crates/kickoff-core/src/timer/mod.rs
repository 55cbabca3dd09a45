mod engine;
mod service;
mod state;

pub use engine::TimerEngine;
pub use service::{TimerService, TICK_INTERVAL};
pub use state::{
    countdown_ms, RunState, TimerDisplay, TimerPhase, TimerState, DEFAULT_DURATION_MS,
    KEY_DURATION, KEY_END_TIME, KEY_STATE, TIMER_KEYS,
};
