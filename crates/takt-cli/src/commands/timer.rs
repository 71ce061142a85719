use std::io::Write;

use chrono::Utc;
use clap::Subcommand;
use takt_core::storage::{Config, Database};
use takt_core::timer::{EngineConfig, TimerEngine};
use takt_core::{SessionHost, ValidationError};

const ENGINE_KEY: &str = "timer_engine";
const STARTED_AT_KEY: &str = "session_started_at";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start tracking elapsed time
    Start,
    /// Pause tracking (consumes one pause from the budget)
    Pause,
    /// Resume tracking after a pause
    Resume,
    /// Reset to idle state
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Override the accumulated time (milliseconds or HH:MM:SS)
    SetTime { value: String },
    /// Override the consumed pause count
    SetPauses { count: u32 },
    /// Live readout until Ctrl-C
    Watch,
    /// Record the session and reset the timer
    Finish {
        /// Label stored with the session record
        #[arg(long)]
        label: Option<String>,
    },
}

fn load_engine(db: &Database, config: &Config) -> TimerEngine {
    if let Ok(Some(json)) = db.kv_get(ENGINE_KEY) {
        if let Ok(engine) = serde_json::from_str::<TimerEngine>(&json) {
            return engine;
        }
    }
    TimerEngine::new(config.engine())
}

fn save_engine(db: &Database, engine: &TimerEngine) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(engine)?;
    db.kv_set(ENGINE_KEY, &json)?;
    Ok(())
}

/// Accepts raw milliseconds ("90000") or a clock value ("01:30:00").
fn parse_time_arg(value: &str) -> Result<u64, ValidationError> {
    if let Ok(ms) = value.parse::<u64>() {
        return Ok(ms);
    }
    let invalid = || ValidationError::InvalidValue {
        field: "time".into(),
        message: format!("cannot parse '{value}' as milliseconds or HH:MM:SS"),
    };
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() == 3 {
        let hours = parts[0].parse::<u64>().map_err(|_| invalid())?;
        let minutes = parts[1].parse::<u64>().map_err(|_| invalid())?;
        let seconds = parts[2].parse::<u64>().map_err(|_| invalid())?;
        if minutes < 60 && seconds < 60 {
            return Ok((hours * 3_600 + minutes * 60 + seconds) * 1_000);
        }
    }
    Err(invalid())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let db = Database::open()?;
    let mut engine = load_engine(&db, &config);

    match action {
        TimerAction::Start => {
            if let Some(event) = engine.start() {
                if db.kv_get(STARTED_AT_KEY)?.is_none() {
                    db.kv_set(STARTED_AT_KEY, &Utc::now().to_rfc3339())?;
                }
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
            }
        }
        TimerAction::Pause => {
            if let Some(event) = engine.pause() {
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
            }
        }
        TimerAction::Resume => {
            if let Some(event) = engine.resume() {
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
            }
        }
        TimerAction::Reset => {
            let event = engine.reset();
            db.kv_delete(STARTED_AT_KEY)?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        TimerAction::Status => {
            engine.tick();
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
        }
        TimerAction::SetTime { value } => {
            let ms = parse_time_arg(&value)?;
            engine.set_time(ms);
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
        }
        TimerAction::SetPauses { count } => {
            engine.set_pauses(count);
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
        }
        TimerAction::Watch => {
            watch(&config, &engine)?;
        }
        TimerAction::Finish { label } => {
            engine.tick();
            let snapshot = engine.snapshot();
            let completed_at = Utc::now();
            let started_at = db
                .kv_get(STARTED_AT_KEY)?
                .and_then(|raw| chrono::DateTime::parse_from_rfc3339(&raw).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| {
                    completed_at - chrono::Duration::milliseconds(snapshot.elapsed_ms as i64)
                });
            let label = label.unwrap_or_else(|| config.default_label.clone());
            let id = db.record_session(
                &label,
                snapshot.elapsed_ms,
                snapshot.pauses_used,
                started_at,
                completed_at,
            )?;
            engine.reset();
            db.kv_delete(STARTED_AT_KEY)?;
            let recorded = db
                .recent_sessions(1)?
                .into_iter()
                .find(|r| r.id == id)
                .ok_or("recorded session not found")?;
            println!("{}", serde_json::to_string_pretty(&recorded)?);
        }
    }

    save_engine(&db, &engine)?;
    Ok(())
}

/// Observe the persisted session live. Watching never mutates tracked
/// state - elapsed time is anchor-derived, so there is nothing to save on
/// exit. A session persisted mid-pause is shown frozen at its last value.
fn watch(config: &Config, engine: &TimerEngine) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = engine.snapshot();
    let host = SessionHost::new();
    let handle = host.acquire(EngineConfig {
        max_pauses: engine.max_pauses(),
        initial_time_ms: snapshot.elapsed_ms,
        initial_pauses: snapshot.pauses_used,
    });
    if snapshot.is_running && !snapshot.is_paused {
        handle.start();
    }

    let show_hundredths = config.display.show_hundredths;
    let period = config.tick_interval();
    tracing::debug!(period_ms = period.as_millis() as u64, "live readout started");
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut rx = handle.subscribe();
        let _ticker = handle.spawn_ticker(period);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snap = rx.borrow_and_update().clone();
                    let line = if show_hundredths {
                        format!("{}.{:02}", snap.formatted.text, snap.formatted.hundredths)
                    } else {
                        snap.formatted.text.clone()
                    };
                    print!("\r{line}  (pauses {}/{})", snap.pauses_used, snap.max_pauses);
                    let _ = std::io::stdout().flush();
                }
            }
        }
    });
    println!();
    host.release();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_arg_accepts_milliseconds() {
        assert_eq!(parse_time_arg("90000").unwrap(), 90_000);
        assert_eq!(parse_time_arg("0").unwrap(), 0);
    }

    #[test]
    fn parse_time_arg_accepts_clock_values() {
        assert_eq!(parse_time_arg("01:30:00").unwrap(), 5_400_000);
        assert_eq!(parse_time_arg("00:00:05").unwrap(), 5_000);
        assert_eq!(parse_time_arg("100:00:00").unwrap(), 360_000_000);
    }

    #[test]
    fn parse_time_arg_rejects_garbage() {
        assert!(parse_time_arg("abc").is_err());
        assert!(parse_time_arg("1:2").is_err());
        assert!(parse_time_arg("00:75:00").is_err());
    }
}
