//! End-to-end exercises of the session host driving the timer engine the
//! way UI consumers do: acquire, operate, observe, release, revisit.

use std::time::Duration;

use takt_core::{EngineConfig, Event, SessionHost, TimerEngine};

fn config(max_pauses: u32) -> EngineConfig {
    EngineConfig {
        max_pauses,
        ..EngineConfig::default()
    }
}

#[test]
fn worker_session_with_limited_interruptions() {
    let host = SessionHost::new();
    let handle = host.acquire(config(2));

    assert!(matches!(handle.start(), Some(Event::TimerStarted { .. })));

    // Two interruptions are within budget.
    assert!(matches!(handle.pause(), Some(Event::TimerPaused { .. })));
    assert!(matches!(handle.resume(), Some(Event::TimerResumed { .. })));
    assert!(matches!(handle.pause(), Some(Event::TimerPaused { .. })));
    assert!(matches!(handle.resume(), Some(Event::TimerResumed { .. })));

    // The third is refused and the timer keeps running.
    assert!(matches!(handle.pause(), Some(Event::PauseRefused { .. })));
    let snap = handle.snapshot();
    assert!(snap.is_running);
    assert!(!snap.is_paused);
    assert_eq!(snap.pauses_used, 2);
    assert_eq!(snap.remaining_pauses, 0);
}

#[test]
fn independent_consumers_share_one_clock() {
    let host = SessionHost::new();
    // A badge, an overlay and an indicator all mount independently.
    let badge = host.acquire(config(3));
    let overlay = host.acquire(config(3));
    let indicator = host.acquire(config(3));

    badge.start();
    overlay.pause();

    for consumer in [&badge, &overlay, &indicator] {
        let snap = consumer.snapshot();
        assert!(snap.is_paused);
        assert_eq!(snap.pauses_used, 1);
    }
}

#[test]
fn revisited_session_continues_where_it_left_off() {
    let host = SessionHost::new();
    let handle = host.acquire(config(3));
    handle.start();
    handle.pause();
    host.release();
    drop(handle);

    let handle = host.acquire(config(3));
    let snap = handle.snapshot();
    assert!(snap.is_paused);
    assert_eq!(snap.pauses_used, 1);

    assert!(matches!(handle.resume(), Some(Event::TimerResumed { .. })));
}

#[test]
fn hydrated_session_resumes_partially_consumed_state() {
    // A session restored from an external store: 5 s already tracked, two
    // pauses already taken.
    let host = SessionHost::new();
    let handle = host.acquire(EngineConfig {
        max_pauses: 3,
        initial_time_ms: 5_000,
        initial_pauses: 2,
    });

    let snap = handle.snapshot();
    assert_eq!(snap.elapsed_ms, 5_000);
    assert_eq!(snap.remaining_pauses, 1);
    assert_eq!(snap.formatted.text, "00:00:05");
}

#[test]
fn engine_roundtrips_through_an_external_store() {
    // The hydration collaborators persist the engine as JSON (the CLI's kv
    // store does exactly this between invocations).
    let mut engine = TimerEngine::new(config(3));
    engine.start();
    engine.pause();

    let stored = serde_json::to_string(&engine).unwrap();
    let restored: TimerEngine = serde_json::from_str(&stored).unwrap();

    assert!(restored.is_paused());
    assert_eq!(restored.pauses_used(), 1);
    assert_eq!(restored.remaining_pauses(), 2);
}

#[tokio::test]
async fn ticker_feeds_every_subscriber_the_same_value() {
    let host = SessionHost::new();
    let handle = host.acquire(config(3));
    handle.start();

    let mut rx_a = handle.subscribe();
    let rx_b = handle.subscribe();
    let ticker = handle.spawn_ticker(Duration::from_millis(5));

    tokio::time::timeout(Duration::from_secs(1), rx_a.changed())
        .await
        .expect("ticker never published")
        .expect("snapshot channel closed");

    let a = rx_a.borrow().clone();
    let b = rx_b.borrow().clone();
    assert_eq!(a.elapsed_ms, b.elapsed_ms);
    assert_eq!(a.pauses_used, b.pauses_used);

    drop(ticker);
    host.release();
}
