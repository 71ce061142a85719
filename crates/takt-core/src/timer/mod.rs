mod budget;
mod engine;
mod format;

pub use budget::PauseBudget;
pub use engine::{EngineConfig, TimerEngine, TimerSnapshot, TimerState};
pub use format::{format_time, FormattedTime};
