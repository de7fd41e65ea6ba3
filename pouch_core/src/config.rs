//! Configuration file support for pouch.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/pouch/config.toml`. It is
//! the settings provider for the calculator: the absorption window is read
//! from here once per command and passed down as an [`AbsorptionConfig`].

use crate::{AbsorptionConfig, Error, FullReleaseTime, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Longest history window accepted from the config file
pub const MAX_HISTORY_DAYS: i64 = 3650;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub absorption: AbsorptionSettings,
}

/// Data location configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How far back to load finished pouches
    #[serde(default = "default_history_days")]
    pub history_days: i64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_days: default_history_days(),
        }
    }
}

/// Absorption model settings
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AbsorptionSettings {
    #[serde(default, rename = "full_release_minutes")]
    pub full_release: FullReleaseTime,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local/share"))
            .unwrap_or_else(|| PathBuf::from("."))
    });
    base.join("pouch")
}

fn default_history_days() -> i64 {
    2
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .unwrap_or_else(|| PathBuf::from("."))
        });
        base.join("pouch").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    ///
    /// Writes to a temp file in the same directory and renames it over the
    /// target, so readers never see a half-written file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(contents.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Check values serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_HISTORY_DAYS).contains(&self.data.history_days) {
            return Err(Error::Config(format!(
                "history_days must be between 0 and {} (got {})",
                MAX_HISTORY_DAYS, self.data.history_days
            )));
        }
        Ok(())
    }

    /// Calculator parameters for the configured release time
    pub fn absorption_config(&self) -> AbsorptionConfig {
        AbsorptionConfig::new(self.absorption.full_release)
    }

    /// Path of the JSON Lines event file
    pub fn events_jsonl_path(&self) -> PathBuf {
        events_jsonl_path(&self.data.data_dir)
    }

    /// Path of the CSV event export
    pub fn events_csv_path(&self) -> PathBuf {
        events_csv_path(&self.data.data_dir)
    }
}

/// JSON Lines event file inside a data directory
pub fn events_jsonl_path(data_dir: &Path) -> PathBuf {
    data_dir.join("events.jsonl")
}

/// CSV event export inside a data directory
pub fn events_csv_path(data_dir: &Path) -> PathBuf {
    data_dir.join("events.csv")
}
