//! # Kickoff Core Library
//!
//! This library provides the core logic for Kickoff, a hackathon countdown
//! with a live commit feed. It follows a CLI-first philosophy: every
//! operation is available through the standalone `kickoff` binary, which is
//! a thin display layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based countdown state machine persisted in
//!   a key-value store; the caller invokes `tick()` (or runs a `TimerService`)
//! - **Storage**: SQLite `kv` table with cross-process change notification,
//!   and TOML-based configuration
//! - **Commit Watcher**: SHA-based push detection over a set of repositories,
//!   feeding a FIFO notification queue and a live leaderboard
//! - **Scheduler**: Repeating tasks behind a trait, with a deterministic fake
//!   for tests
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core countdown state machine
//! - [`CommitWatcher`]: Poller and notification queue
//! - [`SqliteStore`]: Persistent key-value store
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod console;
pub mod control;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod scheduler;
pub mod sources;
pub mod storage;
pub mod timer;
pub mod watcher;

pub use clock::{Clock, ManualClock, SystemClock};
pub use console::{Command, ConsoleOutput};
pub use control::{ControlClient, RemoteTimer};
pub use error::{ConfigError, ControlError, CoreError, FetchError, StorageError, ValidationError};
pub use events::Event;
pub use leaderboard::{Leaderboard, LeaderboardRow};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, TokioScheduler};
pub use sources::{CommitInfo, CommitSource, GitHubCommitSource, ProxyCommitSource};
pub use storage::{Config, KvStore, MemoryStore, SqliteStore, StoreChange};
pub use timer::{TimerDisplay, TimerEngine, TimerPhase, TimerService, TimerState};
pub use watcher::{CommitWatcher, NotificationQueue, NotificationQueueEntry, PollReport, WatcherService};
