//! Configuration loading and management
//!
//! Handles parsing of the `config.toml` file kept in the data directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::store;

/// File name of the configuration inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

const MAX_INTERVAL_MS: u64 = 60_000;
const MIN_REFRESH_MS: u64 = 10;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Running-task timer configuration
    #[serde(default)]
    pub timer: TimerConfig,

    /// `watch` command configuration
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Storage-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store key the task list is saved under
    #[serde(default = "default_key")]
    pub key: String,
}

fn default_key() -> String {
    crate::task_collection::TaskCollection::STORAGE_KEY.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { key: default_key() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Milliseconds between elapsed-time refreshes of a running task
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    crate::timer::DEFAULT_INTERVAL.as_millis() as u64
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl TimerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Default redraw period for `watch`
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

fn default_refresh_ms() -> u64 {
    1000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from the data directory, or return defaults
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        store::validate_key(&self.storage.key)
            .map_err(|err| Error::InvalidConfig(format!("storage.key: {err}")))?;
        if self.timer.interval_ms == 0 || self.timer.interval_ms > MAX_INTERVAL_MS {
            return Err(Error::InvalidConfig(format!(
                "timer.interval_ms must be between 1 and {MAX_INTERVAL_MS}"
            )));
        }
        if self.watch.refresh_ms < MIN_REFRESH_MS {
            return Err(Error::InvalidConfig(format!(
                "watch.refresh_ms must be >= {MIN_REFRESH_MS}"
            )));
        }
        Ok(())
    }
}

/// Platform data directory for tasktimer, if the platform has one
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tasktimer").map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.storage.key, "tasks");
        assert_eq!(cfg.timer.interval_ms, 10);
        assert_eq!(cfg.timer.interval(), Duration::from_millis(10));
        assert_eq!(cfg.watch.refresh_ms, 1000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[storage]
key = "work-tasks"

[timer]
interval_ms = 250
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.storage.key, "work-tasks");
        assert_eq!(cfg.timer.interval_ms, 250);
        assert_eq!(cfg.watch.refresh_ms, 1000);
    }

    #[test]
    fn invalid_storage_key_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[storage]\nkey = \"../escape\"").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(message) => assert!(message.contains("storage.key")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn out_of_range_intervals_rejected() {
        let mut cfg = Config::default();
        cfg.timer.interval_ms = 0;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
        cfg.timer.interval_ms = 60_001;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
        cfg.timer.interval_ms = 10;
        cfg.watch.refresh_ms = 5;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[timer\ninterval_ms = ").expect("write config");
        assert!(matches!(Config::load(&path), Err(Error::TomlParse(_))));
    }

    #[test]
    fn load_from_dir_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path()).expect("defaults");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let mut cfg = Config::default();
        cfg.watch.refresh_ms = 200;
        cfg.save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("key = \"tasks\""));
        assert_eq!(Config::load_from_dir(dir.path()).expect("load"), cfg);
    }
}
