//! Commit watcher.
//!
//! Polls every configured repository, detects pushes by comparing commit
//! SHAs, and queues one notification per push. The first sighting of a
//! repository only seeds its SHA, so starting the watcher never produces a
//! burst of notifications for history that already existed.
//!
//! ## Usage
//!
//! ```ignore
//! let watcher = CommitWatcher::new(source, repos, Arc::new(SystemClock));
//! let report = watcher.poll_once().await;
//! if let Some(entry) = watcher.active() {
//!     // show it, then:
//!     watcher.acknowledge();
//! }
//! ```

mod queue;
mod record;
mod service;

use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

pub use queue::{NotificationQueue, NotificationQueueEntry};
pub use record::{CommitRecord, Observation};
pub use service::WatcherService;

use crate::clock::Clock;
use crate::events::Event;
use crate::leaderboard::Leaderboard;
use crate::sources::{summarize_message, CommitInfo, CommitSource};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Per-resource outcome of one poll cycle, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub seeded: Vec<String>,
    pub unchanged: Vec<String>,
    pub changed: Vec<String>,
    pub failed: Vec<String>,
}

impl PollReport {
    pub fn total(&self) -> usize {
        self.seeded.len() + self.unchanged.len() + self.changed.len() + self.failed.len()
    }
}

#[derive(Debug, Default)]
struct WatchState {
    records: IndexMap<String, CommitRecord>,
    queue: NotificationQueue,
    leaderboard: Leaderboard,
}

pub struct CommitWatcher<S> {
    source: S,
    resources: Vec<String>,
    clock: Arc<dyn Clock>,
    state: Mutex<WatchState>,
    active: watch::Sender<Option<NotificationQueueEntry>>,
    events: broadcast::Sender<Event>,
}

impl<S: CommitSource> CommitWatcher<S> {
    pub fn new(source: S, resources: Vec<String>, clock: Arc<dyn Clock>) -> Self {
        let (active, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            resources,
            clock,
            state: Mutex::new(WatchState::default()),
            active,
            events,
        }
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Fetch every resource concurrently, then apply the results in
    /// configured order. A failed fetch skips that resource until the next
    /// cycle.
    pub async fn poll_once(&self) -> PollReport {
        let mut fetches = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            fetches.push(self.source.fetch(resource));
        }
        let results = join_all(fetches).await;

        let mut report = PollReport::default();
        let mut detected = Vec::new();
        {
            let mut state = self.lock();
            for (resource, result) in self.resources.iter().zip(results) {
                match result {
                    Ok(info) => match self.apply(&mut state, resource, &info) {
                        Observation::Seeded => report.seeded.push(resource.clone()),
                        Observation::Unchanged => report.unchanged.push(resource.clone()),
                        Observation::Changed => {
                            report.changed.push(resource.clone());
                            detected.push(self.entry_for(resource, &info));
                        }
                    },
                    Err(e) => {
                        warn!(resource = %resource, error = %e, "commit fetch failed");
                        report.failed.push(resource.clone());
                    }
                }
            }
            for entry in &detected {
                state.queue.enqueue(entry.clone());
            }
            state.queue.show_next();
            self.publish_active(&state);
        }

        for entry in detected {
            info!(
                resource = %entry.resource_id,
                author = %entry.author,
                total = entry.total_count,
                "new push detected"
            );
            let _ = self.events.send(Event::CommitDetected {
                resource_id: entry.resource_id,
                author: entry.author,
                message_summary: entry.message_summary,
                total_count: entry.total_count,
                at: entry.detected_at,
            });
        }
        debug!(
            seeded = report.seeded.len(),
            changed = report.changed.len(),
            failed = report.failed.len(),
            "poll complete"
        );
        report
    }

    fn apply(&self, state: &mut WatchState, resource: &str, info: &CommitInfo) -> Observation {
        let observation = state
            .records
            .entry(resource.to_string())
            .or_insert_with(|| CommitRecord::new(resource))
            .observe(info);
        if observation != Observation::Unchanged {
            state.leaderboard.update(resource, info.total_commits);
        }
        observation
    }

    fn entry_for(&self, resource: &str, info: &CommitInfo) -> NotificationQueueEntry {
        NotificationQueueEntry {
            resource_id: resource.to_string(),
            author: info.author.clone(),
            message_summary: summarize_message(&info.message),
            total_count: info.total_commits,
            detected_at: self.clock.now(),
        }
    }
}

impl<S> CommitWatcher<S> {
    /// The notification currently on display.
    pub fn active(&self) -> Option<NotificationQueueEntry> {
        self.lock().queue.peek_active().cloned()
    }

    /// Dismiss the active notification and promote the next one.
    pub fn acknowledge(&self) -> Option<NotificationQueueEntry> {
        let mut state = self.lock();
        let done = state.queue.acknowledge();
        self.publish_active(&state);
        done
    }

    /// Follows the active notification as it changes.
    pub fn subscribe_active(&self) -> watch::Receiver<Option<NotificationQueueEntry>> {
        self.active.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().queue.pending_len()
    }

    pub fn record(&self, resource: &str) -> Option<CommitRecord> {
        self.lock().records.get(resource).cloned()
    }

    pub fn leaderboard(&self) -> Leaderboard {
        self.lock().leaderboard.clone()
    }

    fn publish_active(&self, state: &WatchState) {
        let active = state.queue.peek_active().cloned();
        self.active.send_if_modified(|current| {
            if *current == active {
                false
            } else {
                *current = active;
                true
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S> std::fmt::Debug for CommitWatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitWatcher")
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

/// Shared handle, as held by [`WatcherService`] and the display layer.
pub type SharedWatcher<S> = Arc<CommitWatcher<S>>;
