//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `tick()`
//! periodically while the timer is displayed.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!   ^       |
//!   +-- reset() (from any state)
//! ```
//!
//! Elapsed time is never advanced by adding a fixed step per callback.
//! Every recomputation derives it from the start anchor
//! (`elapsed = now - anchor`), so irregular or missed ticks cannot drift
//! the measurement; the paused intervals are excluded because the anchor
//! is moved forward on every resume.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(EngineConfig::default());
//! engine.start();
//! // In a loop:
//! engine.tick();
//! let snap = engine.snapshot();
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::budget::PauseBudget;
use super::format::{format_time, FormattedTime};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Creation parameters for a [`TimerEngine`].
///
/// `initial_time_ms` and `initial_pauses` restore a session that was
/// already partially consumed (e.g. re-opened after a reload); both default
/// to zero for a fresh session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_pauses: u32,
    #[serde(default)]
    pub initial_time_ms: u64,
    #[serde(default)]
    pub initial_pauses: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pauses: 3,
            initial_time_ms: 0,
            initial_pauses: 0,
        }
    }
}

/// Read-only view of the engine state at a point in time.
///
/// Consumers (status badges, overlays, the CLI) display snapshots and never
/// hold references into the engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub elapsed_ms: u64,
    pub is_running: bool,
    pub is_paused: bool,
    pub pauses_used: u32,
    pub max_pauses: u32,
    /// Signed: hydrating a used-count above the quota leaves this negative.
    pub remaining_pauses: i64,
    pub formatted: FormattedTime,
}

/// Core timer engine.
///
/// Operates on wall-clock anchors -- no internal thread. Every mutating
/// operation has an `*_at` form taking the current epoch-millisecond
/// timestamp; the plain forms sample the system clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    state: TimerState,
    /// Accumulated active (non-paused) duration in milliseconds.
    elapsed_ms: u64,
    budget: PauseBudget,
    /// Epoch ms such that `elapsed = now - anchor` while running.
    /// Recomputed on every start/resume so paused time is excluded.
    #[serde(default)]
    start_anchor_ms: Option<u64>,
    /// Epoch ms the current pause began; None when not paused.
    #[serde(default)]
    pause_anchor_ms: Option<u64>,
}

impl TimerEngine {
    pub fn new(config: EngineConfig) -> Self {
        let mut budget = PauseBudget::new(config.max_pauses);
        budget.set_used(config.initial_pauses);
        Self {
            state: TimerState::Idle,
            elapsed_ms: config.initial_time_ms,
            budget,
            start_anchor_ms: None,
            pause_anchor_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running | TimerState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state == TimerState::Paused
    }

    pub fn pauses_used(&self) -> u32 {
        self.budget.used()
    }

    pub fn max_pauses(&self) -> u32 {
        self.budget.max()
    }

    pub fn remaining_pauses(&self) -> i64 {
        self.budget.remaining()
    }

    /// Elapsed active duration as of `now_ms`, without mutating the engine.
    pub fn elapsed_at(&self, now_ms: u64) -> u64 {
        match (self.state, self.start_anchor_ms) {
            (TimerState::Running, Some(anchor)) => now_ms.saturating_sub(anchor),
            _ => self.elapsed_ms,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_at(now_ms())
    }

    /// How long the current pause has lasted, if paused.
    pub fn paused_for_at(&self, now_ms: u64) -> Option<u64> {
        match self.state {
            TimerState::Paused => self.pause_anchor_ms.map(|p| now_ms.saturating_sub(p)),
            _ => None,
        }
    }

    /// Build a snapshot as of `now_ms`. Fresh on demand - no tick needed.
    pub fn snapshot_at(&self, now_ms: u64) -> TimerSnapshot {
        let elapsed_ms = self.elapsed_at(now_ms);
        TimerSnapshot {
            elapsed_ms,
            is_running: self.is_running(),
            is_paused: self.is_paused(),
            pauses_used: self.budget.used(),
            max_pauses: self.budget.max(),
            remaining_pauses: self.budget.remaining(),
            formatted: format_time(elapsed_ms),
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshot_at(now_ms())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start tracking. No-op when already running or paused - duplicate UI
    /// triggers are tolerated, not errors.
    pub fn start_at(&mut self, now_ms: u64) -> Option<Event> {
        match self.state {
            TimerState::Idle => {
                self.state = TimerState::Running;
                // Preserves time accumulated before the start (set_time).
                self.start_anchor_ms = Some(now_ms.saturating_sub(self.elapsed_ms));
                Some(Event::TimerStarted {
                    elapsed_ms: self.elapsed_ms,
                    at: Utc::now(),
                })
            }
            TimerState::Running | TimerState::Paused => None,
        }
    }

    pub fn start(&mut self) -> Option<Event> {
        self.start_at(now_ms())
    }

    /// Pause tracking, consuming one pause from the budget.
    ///
    /// When the budget is exhausted the call returns
    /// [`Event::PauseRefused`] and the engine keeps running, untouched;
    /// the event is emitted exactly once per refused call. Pausing while
    /// idle or already paused is a silent no-op.
    pub fn pause_at(&mut self, now_ms: u64) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                if !self.budget.try_consume() {
                    return Some(Event::PauseRefused {
                        pauses_used: self.budget.used(),
                        max_pauses: self.budget.max(),
                        at: Utc::now(),
                    });
                }
                // Flush elapsed time before dropping the anchor.
                self.elapsed_ms = self
                    .start_anchor_ms
                    .map(|a| now_ms.saturating_sub(a))
                    .unwrap_or(self.elapsed_ms);
                self.state = TimerState::Paused;
                self.start_anchor_ms = None;
                self.pause_anchor_ms = Some(now_ms);
                Some(Event::TimerPaused {
                    elapsed_ms: self.elapsed_ms,
                    pauses_used: self.budget.used(),
                    remaining_pauses: self.budget.remaining(),
                    at: Utc::now(),
                })
            }
            TimerState::Idle | TimerState::Paused => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.pause_at(now_ms())
    }

    /// Resume from a pause. The anchor is moved to `now - elapsed`, so the
    /// paused interval never enters the measurement. No-op when not paused.
    pub fn resume_at(&mut self, now_ms: u64) -> Option<Event> {
        match self.state {
            TimerState::Paused => {
                self.state = TimerState::Running;
                self.start_anchor_ms = Some(now_ms.saturating_sub(self.elapsed_ms));
                self.pause_anchor_ms = None;
                Some(Event::TimerResumed {
                    elapsed_ms: self.elapsed_ms,
                    remaining_pauses: self.budget.remaining(),
                    at: Utc::now(),
                })
            }
            TimerState::Idle | TimerState::Running => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        self.resume_at(now_ms())
    }

    /// Return to creation defaults. Always succeeds.
    pub fn reset(&mut self) -> Option<Event> {
        self.state = TimerState::Idle;
        self.elapsed_ms = 0;
        self.budget.reset();
        self.start_anchor_ms = None;
        self.pause_anchor_ms = None;
        Some(Event::TimerReset { at: Utc::now() })
    }

    /// Override the accumulated time (hydration from an external store).
    /// While running the anchor is recomputed so the next tick agrees.
    pub fn set_time_at(&mut self, ms: u64, now_ms: u64) {
        self.elapsed_ms = ms;
        if self.state == TimerState::Running {
            self.start_anchor_ms = Some(now_ms.saturating_sub(ms));
        }
    }

    pub fn set_time(&mut self, ms: u64) {
        self.set_time_at(ms, now_ms());
    }

    /// Override the consumed pause count (hydration). Not validated against
    /// the quota; see [`PauseBudget::set_used`].
    pub fn set_pauses(&mut self, count: u32) {
        self.budget.set_used(count);
    }

    /// Call periodically while the timer is displayed. Recomputes elapsed
    /// time from the anchor; no effect when idle or paused.
    pub fn tick_at(&mut self, now_ms: u64) {
        if self.state == TimerState::Running {
            if let Some(anchor) = self.start_anchor_ms {
                self.elapsed_ms = now_ms.saturating_sub(anchor);
            }
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(now_ms());
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
