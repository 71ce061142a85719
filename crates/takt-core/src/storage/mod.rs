mod config;
pub mod database;

pub use config::{Config, DisplayConfig, TimerConfig};
pub use database::{Database, Stats, WorkSessionRecord};

use std::path::PathBuf;

/// Returns `~/.config/takt[-dev]/` based on TAKT_ENV.
///
/// Set TAKT_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TAKT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("takt-dev")
    } else {
        base_dir.join("takt")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
