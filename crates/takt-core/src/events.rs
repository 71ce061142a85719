use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every state change in the engine produces an Event.
/// Consumers poll snapshots for display and react to events for
/// transitions (e.g. showing an "out of pauses" dialog on `PauseRefused`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        elapsed_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        elapsed_ms: u64,
        pauses_used: u32,
        remaining_pauses: i64,
        at: DateTime<Utc>,
    },
    /// A pause was requested with no budget left. Fired exactly once per
    /// refused call; the engine keeps running, untouched.
    PauseRefused {
        pauses_used: u32,
        max_pauses: u32,
        at: DateTime<Utc>,
    },
    TimerResumed {
        elapsed_ms: u64,
        remaining_pauses: i64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
}
