//! Repeating-task scheduler.
//!
//! Both the one-second countdown tick and the commit poll run through a
//! [`Scheduler`], never through ad-hoc `tokio::spawn` loops, so tests can swap
//! in [`ManualScheduler`] and move time deterministically.
//!
//! ## Usage
//!
//! ```ignore
//! let handle = scheduler.schedule_repeating(Duration::from_secs(1), false, Box::new(|| {
//!     Box::pin(async { /* work */ })
//! }));
//! // Dropping or cancelling the handle stops the task.
//! handle.cancel();
//! ```

mod manual;
mod runtime;

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

/// Future produced by one run of a repeating task.
pub type TaskFuture = BoxFuture<'static, ()>;

/// A task body; invoked once per interval.
pub type RepeatingTask = Box<dyn FnMut() -> TaskFuture + Send>;

pub trait Scheduler: Send + Sync {
    /// Run `task` every `interval` until the returned handle is cancelled or
    /// dropped. When `immediate` is set the first run is due right away,
    /// otherwise one interval from now.
    fn schedule_repeating(
        &self,
        interval: Duration,
        immediate: bool,
        task: RepeatingTask,
    ) -> TaskHandle;
}

/// Cancels its task when cancelled explicitly or dropped.
pub struct TaskHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TaskHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}
