use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use super::CommitWatcher;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::sources::CommitSource;

/// Polls a [`CommitWatcher`] on a fixed interval.
///
/// `start` polls immediately, then every `interval`. Calling it again while
/// active does nothing. `stop`, or dropping the service, cancels the task.
pub struct WatcherService<S> {
    watcher: Arc<CommitWatcher<S>>,
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
    handle: Mutex<Option<TaskHandle>>,
}

impl<S> WatcherService<S>
where
    S: CommitSource + 'static,
{
    pub fn new(watcher: Arc<CommitWatcher<S>>, scheduler: Arc<dyn Scheduler>, interval: Duration) -> Self {
        Self {
            watcher,
            scheduler,
            interval,
            handle: Mutex::new(None),
        }
    }

    pub fn watcher(&self) -> &Arc<CommitWatcher<S>> {
        &self.watcher
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.handle().is_some()
    }

    pub fn start(&self) {
        let mut handle = self.handle();
        if handle.is_some() {
            debug!("watcher already active");
            return;
        }
        let watcher = Arc::clone(&self.watcher);
        *handle = Some(self.scheduler.schedule_repeating(
            self.interval,
            true,
            Box::new(move || {
                let watcher = Arc::clone(&watcher);
                Box::pin(async move {
                    watcher.poll_once().await;
                })
            }),
        ));
        debug!(
            interval_secs = self.interval.as_secs(),
            resources = self.watcher.resources().len(),
            "watcher started"
        );
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle().take() {
            handle.cancel();
            debug!("watcher stopped");
        }
    }

    fn handle(&self) -> MutexGuard<'_, Option<TaskHandle>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
