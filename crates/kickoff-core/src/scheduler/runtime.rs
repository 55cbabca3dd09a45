use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{RepeatingTask, Scheduler, TaskHandle};

/// Runs repeating tasks on the ambient tokio runtime.
///
/// Must be used from within a runtime context.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_repeating(
        &self,
        interval: Duration,
        immediate: bool,
        mut task: RepeatingTask,
    ) -> TaskHandle {
        let interval = interval.max(Duration::from_millis(1));
        let join = tokio::spawn(async move {
            let first = if immediate {
                Instant::now()
            } else {
                Instant::now() + interval
            };
            let mut ticker = interval_at(first, interval);
            // A slow poll must not cause a burst of catch-up runs.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
        let abort = join.abort_handle();
        TaskHandle::new(move || abort.abort())
    }
}
