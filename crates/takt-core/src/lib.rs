//! # Takt Core Library
//!
//! This library provides the core logic for takt, a process timer with a
//! bounded pause allowance: it tracks how long a worker spends on a process
//! step while permitting a limited number of interruptions. All operations
//! are available via a standalone CLI binary; GUI front ends are thin
//! layers over the same core library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine that requires the
//!   caller to periodically invoke `tick()` for progress updates. Elapsed
//!   time is derived from anchors, never stepped incrementally, so uneven
//!   tick cadence cannot drift the measurement.
//! - **Session Host**: Process-wide owner of the single active engine;
//!   publishes snapshots to any number of subscribers over a watch channel.
//! - **Storage**: SQLite-based session storage and TOML-based configuration.
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`SessionHost`]: Shared ownership and snapshot publication
//! - [`Database`]: Session persistence and statistics
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::Event;
pub use session::{SessionHandle, SessionHost, TickerGuard};
pub use storage::{Config, Database, Stats, WorkSessionRecord};
pub use timer::{format_time, EngineConfig, FormattedTime, PauseBudget, TimerEngine, TimerSnapshot, TimerState};
