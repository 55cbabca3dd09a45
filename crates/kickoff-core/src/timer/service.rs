use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

use super::TimerEngine;
use crate::events::Event;
use crate::scheduler::{Scheduler, TaskHandle};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives a [`TimerEngine`] once per second through a [`Scheduler`].
///
/// Each tick first picks up writes made by other engines on the same store,
/// then advances the countdown. Every resulting event, and every event from a
/// command issued through [`execute`](Self::execute), goes out on a broadcast
/// channel.
pub struct TimerService {
    engine: Arc<Mutex<TimerEngine>>,
    scheduler: Arc<dyn Scheduler>,
    events: broadcast::Sender<Event>,
    handle: Mutex<Option<TaskHandle>>,
}

impl TimerService {
    pub fn new(engine: TimerEngine, scheduler: Arc<dyn Scheduler>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            scheduler,
            events,
            handle: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Run a command against the engine and publish what it returns.
    pub fn execute<F>(&self, command: F) -> Option<Event>
    where
        F: FnOnce(&mut TimerEngine) -> Option<Event>,
    {
        let event = command(&mut lock(&self.engine));
        if let Some(event) = &event {
            let _ = self.events.send(event.clone());
        }
        event
    }

    /// Read-only access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&TimerEngine) -> R) -> R {
        f(&lock(&self.engine))
    }

    /// Mutable access for callers that publish their own events.
    pub fn with_engine_mut<R>(&self, f: impl FnOnce(&mut TimerEngine) -> R) -> R {
        f(&mut lock(&self.engine))
    }

    pub fn publish(&self, event: Event) {
        let _ = self.events.send(event);
    }

    pub fn is_active(&self) -> bool {
        lock(&self.handle).is_some()
    }

    /// Begin ticking. A second call while active does nothing.
    pub fn start(&self) {
        let mut handle = lock(&self.handle);
        if handle.is_some() {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let events = self.events.clone();
        let mut changes = lock(&self.engine).subscribe();

        *handle = Some(self.scheduler.schedule_repeating(
            TICK_INTERVAL,
            false,
            Box::new(move || {
                let mut engine = lock(&engine);
                engine.poll_store();
                loop {
                    match changes.try_recv() {
                        Ok(change) => {
                            if let Some(event) = engine.apply_change(&change) {
                                let _ = events.send(event);
                            }
                        }
                        Err(TryRecvError::Lagged(skipped)) => {
                            debug!(skipped, "store change feed lagged, reloading");
                            engine.reload();
                        }
                        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                    }
                }
                if let Some(event) = engine.tick() {
                    let _ = events.send(event);
                }
                futures::future::ready(()).boxed()
            }),
        ));
        debug!("timer service started");
    }

    /// Stop ticking. The countdown itself is untouched.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.handle).take() {
            handle.cancel();
            debug!("timer service stopped");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
