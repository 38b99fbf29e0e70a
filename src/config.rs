//! Daemon and CLI configuration
//!
//! JSON file at `~/.config/quickfill/config.json`. Every field has a default,
//! so a missing file or missing keys are fine; a file that does not parse is
//! an error and is never overwritten.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::config::{APP_DIR, FILENAME};
use crate::constants::surface::{STANDALONE_WINDOW_HEIGHT, STANDALONE_WINDOW_WIDTH};
use crate::coordinator::WindowSettings;
use crate::host::HostCapabilities;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Used when `LOG_LEVEL` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where `local.json` / `sync.json` live (default: data dir)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Disable to run with the local area only
    #[serde(default = "default_sync_enabled")]
    pub sync_enabled: bool,

    #[serde(default)]
    pub capabilities: HostCapabilities,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_window_width() -> u32 {
    STANDALONE_WINDOW_WIDTH
}

fn default_window_height() -> u32 {
    STANDALONE_WINDOW_HEIGHT
}

fn default_sync_enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: None,
            socket_path: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            sync_enabled: default_sync_enabled(),
            capabilities: HostCapabilities::default(),
        }
    }
}

/// Something worth logging that happened while loading the config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNotice {
    Missing(PathBuf),
    Corrected {
        field: &'static str,
        value: String,
        using: String,
    },
}

impl ConfigNotice {
    pub fn log(&self) {
        match self {
            ConfigNotice::Missing(path) => {
                info!(path = %path.display(), "No config file found, using defaults");
            }
            ConfigNotice::Corrected { field, value, using } => {
                warn!(
                    field = %field,
                    value = %value,
                    using = %using,
                    "Config value out of range, corrected"
                );
            }
        }
    }
}

/// Too small falls back to the default, too large clamps to the maximum
fn clamp_dimension(field: &'static str, value: &mut u32, default: u32) -> Option<ConfigNotice> {
    use crate::constants::validation::{MAX_WINDOW_DIMENSION, MIN_WINDOW_DIMENSION};

    let corrected = if *value < MIN_WINDOW_DIMENSION {
        default
    } else if *value > MAX_WINDOW_DIMENSION {
        MAX_WINDOW_DIMENSION
    } else {
        return None;
    };

    let notice = ConfigNotice::Corrected {
        field,
        value: value.to_string(),
        using: corrected.to_string(),
    };
    *value = corrected;
    Some(notice)
}

impl Config {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    /// Load from an explicit path, or the default location
    ///
    /// Runs before logging is set up, so what happened during loading comes
    /// back as notices for the caller to log.
    pub fn load(path: Option<&Path>) -> Result<(Self, Vec<ConfigNotice>)> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::config_path()),
        }
    }

    pub fn load_from(path: &Path) -> Result<(Self, Vec<ConfigNotice>)> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let notice = ConfigNotice::Missing(path.to_path_buf());
                return Ok((Self::default(), vec![notice]));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()));
            }
        };

        let mut config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        let notices = config.validate_and_clamp();
        Ok((config, notices))
    }

    /// Validate and clamp values to safe ranges, returning each correction
    pub fn validate_and_clamp(&mut self) -> Vec<ConfigNotice> {
        let mut notices = Vec::new();

        let level = self.log_level.trim().to_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            self.log_level = level;
        } else {
            notices.push(ConfigNotice::Corrected {
                field: "log_level",
                value: self.log_level.clone(),
                using: default_log_level(),
            });
            self.log_level = default_log_level();
        }

        notices.extend(clamp_dimension(
            "window_width",
            &mut self.window_width,
            default_window_width(),
        ));
        notices.extend(clamp_dimension(
            "window_height",
            &mut self.window_height,
            default_window_height(),
        ));

        notices
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let data = dirs::data_dir().context("Failed to determine data directory (no HOME)")?;
        Ok(data.join(APP_DIR))
    }

    pub fn socket_path(&self) -> Result<PathBuf> {
        match &self.socket_path {
            Some(path) => Ok(path.clone()),
            None => crate::ipc::default_socket_path(),
        }
    }

    pub fn window_settings(&self) -> WindowSettings {
        WindowSettings {
            width: self.window_width,
            height: self.window_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let (config, notices) = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(notices, vec![ConfigNotice::Missing(path)]);
        assert_eq!(config.window_settings(), WindowSettings { width: 440, height: 760 });
        assert!(config.sync_enabled);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let (_dir, path) = write_config(
            r#"{
                "log_level": "DEBUG",
                "data_dir": "/tmp/qf",
                "capabilities": { "side_panel": false }
            }"#,
        );

        let (config, notices) = Config::load_from(&path).unwrap();

        assert!(notices.is_empty());
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/qf"));
        assert_eq!(config.window_width, 440);
        assert!(!config.capabilities.side_panel);
        assert!(config.capabilities.open_action_popup);
        assert!(config.capabilities.set_popup);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let (_dir, path) = write_config("{ not json");
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));

        // Left untouched
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_validate_and_clamp() {
        let mut config = Config {
            log_level: "chatty".to_string(),
            window_width: 10,
            window_height: 100_000,
            ..Config::default()
        };

        let notices = config.validate_and_clamp();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.window_width, 440);
        assert_eq!(config.window_height, 4096);
        assert_eq!(
            notices,
            vec![
                ConfigNotice::Corrected {
                    field: "log_level",
                    value: "chatty".to_string(),
                    using: "info".to_string(),
                },
                ConfigNotice::Corrected {
                    field: "window_width",
                    value: "10".to_string(),
                    using: "440".to_string(),
                },
                ConfigNotice::Corrected {
                    field: "window_height",
                    value: "100000".to_string(),
                    using: "4096".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_loaded_file_reports_corrections() {
        let (_dir, path) = write_config(r#"{ "window_height": 50 }"#);

        let (config, notices) = Config::load_from(&path).unwrap();

        assert_eq!(config.window_height, 760);
        assert_eq!(
            notices,
            vec![ConfigNotice::Corrected {
                field: "window_height",
                value: "50".to_string(),
                using: "760".to_string(),
            }]
        );
    }

    #[test]
    fn test_values_in_range_are_not_reported() {
        let mut config = Config {
            window_width: 800,
            window_height: 600,
            ..Config::default()
        };
        assert!(config.validate_and_clamp().is_empty());
    }

    #[test]
    fn test_explicit_socket_path() {
        let config = Config {
            socket_path: Some(PathBuf::from("/run/user/1000/qf.sock")),
            ..Config::default()
        };
        assert_eq!(config.socket_path().unwrap(), PathBuf::from("/run/user/1000/qf.sock"));
    }
}
