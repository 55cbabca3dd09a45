use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{RepeatingTask, Scheduler, TaskFuture, TaskHandle};
use crate::clock::{Clock, ManualClock};

struct Entry {
    id: u64,
    interval_ms: u64,
    next_due_ms: u64,
    task: RepeatingTask,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Deterministic scheduler for tests.
///
/// Nothing runs until [`advance`](Self::advance) is awaited. Tasks scheduled
/// with `immediate` are due at the instant they were scheduled, so
/// `advance(Duration::ZERO)` runs them without moving the clock.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    inner: Arc<Mutex<Inner>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Number of tasks that have not been cancelled.
    pub fn active_tasks(&self) -> usize {
        self.lock().entries.len()
    }

    /// Move the clock forward by `by`, running every task that falls due in
    /// due-time order. A task due several times within the window runs once
    /// per interval.
    pub async fn advance(&self, by: Duration) {
        let target = self.clock.now_ms().saturating_add(by.as_millis() as u64);
        while let Some(run) = self.next_due(target) {
            run.await;
        }
        if target > self.clock.now_ms() {
            self.clock.set(target);
        }
    }

    /// Pops the earliest task due by `target`, moving the clock to its due
    /// time before invoking it.
    fn next_due(&self, target: u64) -> Option<TaskFuture> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .iter_mut()
            .filter(|e| e.next_due_ms <= target)
            .min_by_key(|e| (e.next_due_ms, e.id))?;
        let due_at = entry.next_due_ms;
        entry.next_due_ms = due_at + entry.interval_ms;
        if due_at > self.clock.now_ms() {
            self.clock.set(due_at);
        }
        Some((entry.task)())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(
        &self,
        interval: Duration,
        immediate: bool,
        task: RepeatingTask,
    ) -> TaskHandle {
        let interval_ms = (interval.as_millis() as u64).max(1);
        let now = self.clock.now_ms();
        let id = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.entries.push(Entry {
                id,
                interval_ms,
                next_due_ms: if immediate { now } else { now + interval_ms },
                task,
            });
            id
        };

        let weak = Arc::downgrade(&self.inner);
        TaskHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                inner.entries.retain(|e| e.id != id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_task(log: &Arc<Mutex<Vec<(&'static str, u64)>>>, name: &'static str, clock: &ManualClock) -> RepeatingTask {
        let log = Arc::clone(log);
        let clock = clock.clone();
        Box::new(move || {
            let log = Arc::clone(&log);
            let at = clock.now_ms();
            Box::pin(async move {
                log.lock().unwrap().push((name, at));
            })
        })
    }

    #[tokio::test]
    async fn runs_tasks_in_due_order() {
        let clock = ManualClock::new(0);
        let scheduler = ManualScheduler::new(clock.clone());
        let log = Arc::new(Mutex::new(Vec::new()));

        let _tick = scheduler.schedule_repeating(
            Duration::from_secs(1),
            false,
            recording_task(&log, "tick", &clock),
        );
        let _poll = scheduler.schedule_repeating(
            Duration::from_millis(2500),
            true,
            recording_task(&log, "poll", &clock),
        );

        scheduler.advance(Duration::from_secs(3)).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ("poll", 0),
                ("tick", 1000),
                ("tick", 2000),
                ("poll", 2500),
                ("tick", 3000),
            ]
        );
        assert_eq!(clock.now_ms(), 3000);
    }

    #[tokio::test]
    async fn cancelled_task_never_runs_again() {
        let clock = ManualClock::new(0);
        let scheduler = ManualScheduler::new(clock);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);

        let handle = scheduler.schedule_repeating(
            Duration::from_secs(1),
            false,
            Box::new(move || {
                let c = Arc::clone(&c);
                Box::pin(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                })
            }),
        );
        scheduler.advance(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.cancel();
        assert_eq!(scheduler.active_tasks(), 0);
        scheduler.advance(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_advance_runs_immediate_tasks_only() {
        let clock = ManualClock::new(500);
        let scheduler = ManualScheduler::new(clock.clone());
        let log = Arc::new(Mutex::new(Vec::new()));
        let _now = scheduler.schedule_repeating(Duration::from_secs(10), true, recording_task(&log, "now", &clock));
        let _later = scheduler.schedule_repeating(Duration::from_secs(10), false, recording_task(&log, "later", &clock));

        scheduler.advance(Duration::ZERO).await;

        assert_eq!(*log.lock().unwrap(), vec![("now", 500)]);
        assert_eq!(clock.now_ms(), 500);
    }
}
