//! Runtime configuration
//!
//! Loaded from `<config dir>/balloon-core/config.toml` when present,
//! otherwise defaults. The `BALLOON_DB` environment variable and CLI flags
//! override the file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("balloon-core").join("balloons.db"),
            sweep_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load the config file if it exists, apply env overrides.
    pub fn load() -> Result<Self> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            _ => Config::default(),
        };

        if let Ok(db) = std::env::var("BALLOON_DB") {
            config.database_path = PathBuf::from(db);
        }

        Ok(config)
    }
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("balloon-core").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sweep_interval_secs, 60);
        assert!(config.database_path.ends_with("balloon-core/balloons.db"));
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let config: Config = toml::from_str("sweep_interval_secs = 5").unwrap();
        assert_eq!(config.sweep_interval_secs, 5);
        assert!(config.database_path.ends_with("balloons.db"));
    }
}
