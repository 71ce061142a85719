//! Session host: process-wide owner of the active timer engine.
//!
//! At most one engine exists per logical work session. Independently
//! mounted consumers (a tab badge, a floating indicator, a pause overlay)
//! all acquire the same engine through the host, so they observe one shared
//! clock instead of drifting copies.
//!
//! Snapshots are published over a [`tokio::sync::watch`] channel: the
//! channel stores exactly one latest value, so every subscriber reads the
//! same snapshot per tick. Periodic publication is driven by
//! [`SessionHandle::spawn_ticker`]; the returned guard aborts the task when
//! dropped, so teardown on any exit path stops the recomputation.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::events::Event;
use crate::timer::{EngineConfig, TimerEngine, TimerSnapshot};

struct HostInner {
    /// The single active engine. One mutex guards the whole engine, so the
    /// pause-quota check stays race-free even with concurrent consumers.
    engine: Mutex<Option<TimerEngine>>,
    snapshot_tx: watch::Sender<TimerSnapshot>,
}

impl HostInner {
    fn lock_engine(&self) -> std::sync::MutexGuard<'_, Option<TimerEngine>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recompute and broadcast the current snapshot.
    fn publish(&self) {
        let snapshot = {
            let mut guard = self.lock_engine();
            match guard.as_mut() {
                Some(engine) => {
                    engine.tick();
                    engine.snapshot()
                }
                None => return,
            }
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

/// Owner of the active [`TimerEngine`].
///
/// Pass the host (or handles cloned from it) to consumers explicitly;
/// there is no ambient global.
pub struct SessionHost {
    inner: Arc<HostInner>,
}

impl SessionHost {
    pub fn new() -> Self {
        let idle = TimerEngine::new(EngineConfig::default()).snapshot();
        let (snapshot_tx, _) = watch::channel(idle);
        Self {
            inner: Arc::new(HostInner {
                engine: Mutex::new(None),
                snapshot_tx,
            }),
        }
    }

    /// Create or attach to the active engine.
    ///
    /// Idempotent: every call before the engine is discarded returns a
    /// handle to the same engine, and `config` only applies to the call
    /// that actually creates it.
    pub fn acquire(&self, config: EngineConfig) -> SessionHandle {
        {
            let mut guard = self.inner.lock_engine();
            if guard.is_none() {
                tracing::debug!(max_pauses = config.max_pauses, "session engine created");
                *guard = Some(TimerEngine::new(config));
            }
        }
        self.inner.publish();
        SessionHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Detach from the session without touching accumulated state.
    ///
    /// Publishes one final snapshot so subscribers settle on a consistent
    /// last value. A later [`acquire`](Self::acquire) re-attaches to the
    /// same engine. Consumers own their receivers and ticker guards;
    /// dropping those is what stops observation.
    pub fn release(&self) {
        self.inner.publish();
        tracing::debug!("session released");
    }

    /// Drop the active engine entirely (the owning workflow completed).
    /// Subscribers are left on a reset, idle snapshot.
    pub fn discard(&self) {
        let final_snapshot = {
            let mut guard = self.inner.lock_engine();
            guard.take().map(|mut engine| {
                engine.reset();
                engine.snapshot()
            })
        };
        if let Some(snapshot) = final_snapshot {
            self.inner.snapshot_tx.send_replace(snapshot);
        }
        tracing::debug!("session discarded");
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock_engine().is_some()
    }
}

impl Default for SessionHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to the active engine.
///
/// All mutating operations are serialized behind the host's mutex and
/// publish a fresh snapshot on success. Operations after
/// [`SessionHost::discard`] are no-ops returning `None`.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HostInner>,
}

impl SessionHandle {
    fn command(&self, op: impl FnOnce(&mut TimerEngine) -> Option<Event>) -> Option<Event> {
        let event = {
            let mut guard = self.inner.lock_engine();
            guard.as_mut().and_then(op)
        };
        if let Some(ref event) = event {
            match event {
                Event::PauseRefused {
                    pauses_used,
                    max_pauses,
                    ..
                } => {
                    tracing::warn!(pauses_used, max_pauses, "pause refused: budget exhausted");
                }
                other => tracing::debug!(?other, "timer transition"),
            }
            self.inner.publish();
        }
        event
    }

    pub fn start(&self) -> Option<Event> {
        self.command(TimerEngine::start)
    }

    pub fn pause(&self) -> Option<Event> {
        self.command(TimerEngine::pause)
    }

    pub fn resume(&self) -> Option<Event> {
        self.command(TimerEngine::resume)
    }

    pub fn reset(&self) -> Option<Event> {
        self.command(TimerEngine::reset)
    }

    pub fn set_time(&self, ms: u64) {
        {
            let mut guard = self.inner.lock_engine();
            if let Some(engine) = guard.as_mut() {
                engine.set_time(ms);
            }
        }
        self.inner.publish();
    }

    pub fn set_pauses(&self, count: u32) {
        {
            let mut guard = self.inner.lock_engine();
            if let Some(engine) = guard.as_mut() {
                engine.set_pauses(count);
            }
        }
        self.inner.publish();
    }

    /// Current snapshot, recomputed on demand. Falls back to the last
    /// published value once the engine is discarded.
    pub fn snapshot(&self) -> TimerSnapshot {
        let guard = self.inner.lock_engine();
        match guard.as_ref() {
            Some(engine) => engine.snapshot(),
            None => self.inner.snapshot_tx.borrow().clone(),
        }
    }

    /// Subscribe to published snapshots. Every receiver observes the same
    /// latest value.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Spawn a periodic snapshot publication task on the current tokio
    /// runtime. Cadence only affects display smoothness - elapsed time is
    /// recomputed from wall-clock anchors, so missed ticks cannot drift it.
    ///
    /// The returned guard aborts the task on drop. Hold it for exactly as
    /// long as the session is being observed.
    pub fn spawn_ticker(&self, period: Duration) -> TickerGuard {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                inner.publish();
            }
        });
        TickerGuard { task }
    }
}

/// Cancels the periodic publication task when dropped.
pub struct TickerGuard {
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_pauses: u32) -> EngineConfig {
        EngineConfig {
            max_pauses,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn acquire_is_idempotent() {
        let host = SessionHost::new();
        let a = host.acquire(config(2));
        let b = host.acquire(config(99));

        a.start();
        a.pause();

        // Both handles observe the same engine; the second config was
        // ignored.
        let snap = b.snapshot();
        assert_eq!(snap.pauses_used, 1);
        assert_eq!(snap.max_pauses, 2);
    }

    #[test]
    fn release_preserves_accumulated_state() {
        let host = SessionHost::new();
        let handle = host.acquire(config(3));
        handle.start();
        handle.pause();
        host.release();

        let revisited = host.acquire(config(3));
        let snap = revisited.snapshot();
        assert!(snap.is_paused);
        assert_eq!(snap.pauses_used, 1);
    }

    #[test]
    fn discard_drops_the_engine() {
        let host = SessionHost::new();
        let handle = host.acquire(config(3));
        handle.start();
        host.discard();

        assert!(!host.is_active());
        assert!(handle.start().is_none());
        let snap = handle.snapshot();
        assert!(!snap.is_running);
        assert_eq!(snap.elapsed_ms, 0);
    }

    #[test]
    fn subscribers_see_the_same_snapshot() {
        let host = SessionHost::new();
        let handle = host.acquire(config(3));
        let rx_a = handle.subscribe();
        let rx_b = handle.subscribe();

        handle.start();
        handle.pause();

        let a = rx_a.borrow().clone();
        let b = rx_b.borrow().clone();
        assert_eq!(a.pauses_used, b.pauses_used);
        assert_eq!(a.is_paused, b.is_paused);
        assert!(a.is_paused);
    }

    #[test]
    fn refused_pause_is_observable_through_handle() {
        let host = SessionHost::new();
        let handle = host.acquire(config(1));
        handle.start();
        assert!(matches!(handle.pause(), Some(Event::TimerPaused { .. })));
        handle.resume();
        assert!(matches!(handle.pause(), Some(Event::PauseRefused { .. })));
        assert_eq!(handle.snapshot().pauses_used, 1);
    }

    #[tokio::test]
    async fn ticker_publishes_and_stops_on_drop() {
        let host = SessionHost::new();
        let handle = host.acquire(config(3));
        handle.start();

        let mut rx = handle.subscribe();
        let guard = handle.spawn_ticker(Duration::from_millis(5));
        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("ticker never published")
            .expect("snapshot channel closed");

        drop(guard);
        // Let any in-flight publish land, then confirm silence.
        tokio::time::sleep(Duration::from_millis(25)).await;
        rx.borrow_and_update();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(!rx.has_changed().expect("snapshot channel closed"));
    }
}
