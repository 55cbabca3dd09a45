//! Integration tests for the countdown engine.
//!
//! Covers persistence through the SQLite store, sync between two processes
//! sharing one database file, and state-machine properties over arbitrary
//! command sequences.

use std::sync::Arc;
use std::time::Duration;

use kickoff_core::storage::KvStore;
use kickoff_core::timer::{KEY_END_TIME, KEY_STATE, TICK_INTERVAL};
use kickoff_core::{
    Event, ManualClock, ManualScheduler, MemoryStore, SqliteStore, TimerEngine, TimerPhase,
    TimerService,
};
use proptest::prelude::*;

const T0: u64 = 1_700_000_000_000;

/// Test: a restarted process reconstructs the countdown from the database.
#[test]
fn test_countdown_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kickoff.db");
    let clock = ManualClock::new(T0);

    {
        let store = Arc::new(SqliteStore::open_at(&path).unwrap());
        let mut engine = TimerEngine::new(store, Arc::new(clock.clone()));
        engine.set_time(3, 0, 0).unwrap();
        engine.start().unwrap();
    }

    clock.advance(Duration::from_secs(90 * 60));
    let store = Arc::new(SqliteStore::open_at(&path).unwrap());
    assert_eq!(store.get(KEY_STATE).unwrap().as_deref(), Some("started"));
    assert_eq!(
        store.get(KEY_END_TIME).unwrap(),
        Some((T0 + 3 * 3_600_000).to_string())
    );

    let engine = TimerEngine::new(store, Arc::new(clock));
    let display = engine.display();
    assert_eq!(display.clock_face(), "1:30:00");
    assert!(display.running);
    assert!((display.progress - 0.5).abs() < 1e-9);
}

/// Test: a countdown that ran out while no process was alive expires on the
/// first tick after restart, exactly once.
#[test]
fn test_expiry_while_offline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kickoff.db");
    let clock = ManualClock::new(T0);

    {
        let store = Arc::new(SqliteStore::open_at(&path).unwrap());
        let mut engine = TimerEngine::new(store, Arc::new(clock.clone()));
        engine.set_time(0, 1, 0).unwrap();
        engine.start().unwrap();
    }

    clock.advance(Duration::from_secs(3600));
    let store = Arc::new(SqliteStore::open_at(&path).unwrap());
    let mut engine = TimerEngine::new(store.clone(), Arc::new(clock));
    assert_eq!(engine.phase(), TimerPhase::Expired);
    assert!(matches!(engine.tick(), Some(Event::TimerExpired { .. })));
    assert!(engine.tick().is_none());
    assert_eq!(store.get(KEY_STATE).unwrap().as_deref(), Some("idle"));
}

/// Test: a console process and a display process on the same database file.
/// The display picks up the console's writes on its next tick.
#[tokio::test]
async fn test_cross_process_sync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kickoff.db");
    let clock = ManualClock::new(T0);
    let scheduler = ManualScheduler::new(clock.clone());

    let display_store = Arc::new(SqliteStore::open_at(&path).unwrap());
    let display = TimerService::new(
        TimerEngine::new(display_store, Arc::new(clock.clone())),
        Arc::new(scheduler.clone()),
    );
    let mut events = display.subscribe();
    display.start();

    let console_store = Arc::new(SqliteStore::open_at(&path).unwrap());
    let mut console = TimerEngine::new(console_store, Arc::new(clock.clone()));
    console.set_time(0, 45, 0).unwrap();
    console.start().unwrap();

    scheduler.advance(TICK_INTERVAL).await;

    assert!(matches!(
        events.try_recv().unwrap(),
        Event::TimerSynced { running: true, .. }
    ));
    assert_eq!(
        display.with_engine(|e| e.display().clock_face()),
        "0:44:59"
    );

    console.hard_reset();
    scheduler.advance(TICK_INTERVAL).await;
    assert!(!display.with_engine(TimerEngine::is_initialized));
}

/// Test: the service never fires after stop.
#[tokio::test]
async fn test_stopped_service_does_not_expire() {
    let clock = ManualClock::new(T0);
    let scheduler = ManualScheduler::new(clock.clone());
    let service = TimerService::new(
        TimerEngine::new(Arc::new(MemoryStore::new()), Arc::new(clock)),
        Arc::new(scheduler.clone()),
    );
    let mut events = service.subscribe();
    service.start();
    service.execute(|e| e.set_time(0, 0, 2).ok());
    service.execute(TimerEngine::start);
    service.stop();

    scheduler.advance(Duration::from_secs(5)).await;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, Event::TimerExpired { .. }));
    }
    // Still flagged running: nothing ticked it.
    assert!(service.with_engine(TimerEngine::is_running));
}

#[derive(Debug, Clone)]
enum Op {
    Start,
    Pause,
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        Just(Op::Pause),
        (1u64..60_000).prop_map(Op::Advance),
    ]
}

proptest! {
    /// Start/pause never move the end timestamp once the first start armed it.
    #[test]
    fn prop_start_pause_keep_end_timestamp(ops in proptest::collection::vec(op(), 1..60)) {
        let clock = ManualClock::new(T0);
        let mut engine = TimerEngine::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
        let mut armed_end = None;

        for op in ops {
            match op {
                Op::Start => {
                    engine.start();
                }
                Op::Pause => {
                    engine.pause();
                }
                Op::Advance(ms) => clock.advance(Duration::from_millis(ms)),
            }
            let end = engine.state().end_timestamp_ms;
            match armed_end {
                None => armed_end = end,
                Some(_) => prop_assert_eq!(end, armed_end),
            }
        }
    }

    /// Remaining time never increases across ticks without a re-arm, and
    /// once it hits zero the engine stays stopped.
    #[test]
    fn prop_remaining_is_non_increasing(
        seconds in 1u64..120,
        steps in proptest::collection::vec(1u64..5_000, 1..80),
    ) {
        let clock = ManualClock::new(T0);
        let mut engine = TimerEngine::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
        engine.set_time(0, 0, seconds).unwrap();
        engine.start();

        let mut last = engine.remaining_ms();
        let mut expired = 0;
        for step in steps {
            clock.advance(Duration::from_millis(step));
            if engine.tick().is_some() {
                expired += 1;
            }
            let remaining = engine.remaining_ms();
            prop_assert!(remaining <= last);
            if remaining == 0 {
                prop_assert!(!engine.is_running());
            }
            last = remaining;
        }
        prop_assert!(expired <= 1);
    }
}
