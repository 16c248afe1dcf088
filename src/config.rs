//! Runtime configuration
//!
//! Settings are read from a TOML file in the platform config directory.
//! Every field has a default, so a missing file or a partial file is fine.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/analog-keys/config.toml` |
//! | macOS | `~/Library/Application Support/analog-keys/config.toml` |
//! | Windows | `%APPDATA%\analog-keys\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use analog_keys::Config;
//!
//! let config = Config::load().unwrap_or_default();
//! println!("read timeout: {:?}", config.read_timeout());
//! ```

use crate::device::{RegistryOptions, SessionOptions};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "analog-keys";

/// Returns the path to the config file.
///
/// The file and its directory are not created.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join(APP_DIR).join("config.toml"))
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub registry: RegistryConfig,
    pub events: EventsConfig,
    pub transport: TransportConfig,
}

/// Keyboard reader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Longest a single read waits for a report (in milliseconds)
    pub read_timeout_ms: u64,
    /// Read buffer size in bytes, 0 for the keyboard's own report size
    pub report_size: usize,
    /// Pause after a failed read (in milliseconds)
    pub error_backoff_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
            report_size: 0,
            error_backoff_ms: 50,
        }
    }
}

/// Device registry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Longest shutdown waits for keyboards to close
    pub shutdown_timeout_secs: u64,
    /// Shutdown polling interval (in milliseconds)
    pub shutdown_poll_ms: u64,
    /// Open keyboards as soon as they are recognized
    pub auto_open: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 60,
            shutdown_poll_ms: 50,
            auto_open: false,
        }
    }
}

/// Event delivery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Number of threads delivering events to listeners
    pub worker_threads: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { worker_threads: 3 }
    }
}

/// HID transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Hotplug scan period (in milliseconds)
    pub scan_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 500,
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed or holds
    /// invalid values.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.session.read_timeout_ms == 0, "session.read_timeout_ms must be positive"),
            (self.events.worker_threads == 0, "events.worker_threads must be positive"),
            (self.registry.shutdown_poll_ms == 0, "registry.shutdown_poll_ms must be positive"),
            (self.transport.scan_interval_ms == 0, "transport.scan_interval_ms must be positive"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(ConfigError::Invalid(message.to_string())),
            None => Ok(()),
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.session.read_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.session.error_backoff_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.registry.shutdown_timeout_secs)
    }

    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.registry.shutdown_poll_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.transport.scan_interval_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_timeout: self.read_timeout(),
            report_size: Some(self.session.report_size).filter(|&size| size > 0),
            error_backoff: self.error_backoff(),
        }
    }

    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            session: self.session_options(),
            shutdown_timeout: self.shutdown_timeout(),
            shutdown_poll: self.shutdown_poll(),
            auto_open: self.registry.auto_open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_config_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("analog-keys-test-{}-{}.toml", name, std::process::id()))
    }

    #[test]
    fn config_default_values() {
        let config = Config::default();
        assert_eq!(config.session.read_timeout_ms, 1000);
        assert_eq!(config.session.report_size, 0);
        assert_eq!(config.session.error_backoff_ms, 50);
        assert_eq!(config.registry.shutdown_timeout_secs, 60);
        assert_eq!(config.registry.shutdown_poll_ms, 50);
        assert!(!config.registry.auto_open);
        assert_eq!(config.events.worker_threads, 3);
        assert_eq!(config.transport.scan_interval_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_durations() {
        let config = Config::default();
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(60));
        assert_eq!(config.shutdown_poll(), Duration::from_millis(50));
        assert_eq!(config.scan_interval(), Duration::from_millis(500));
    }

    #[test]
    fn config_default_options_match_library_defaults() {
        let config = Config::default();
        assert_eq!(config.session_options(), SessionOptions::default());
        assert_eq!(config.registry_options(), RegistryOptions::default());
    }

    #[test]
    fn config_report_size_override() {
        let mut config = Config::default();
        config.session.report_size = 64;
        assert_eq!(config.session_options().report_size, Some(64));
    }

    #[test]
    fn config_deserializes_partial_toml() {
        let toml_str = r#"
[session]
read_timeout_ms = 250

[registry]
auto_open = true
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");

        assert_eq!(config.session.read_timeout_ms, 250);
        assert_eq!(config.session.error_backoff_ms, 50);
        assert!(config.registry.auto_open);
        assert_eq!(config.registry.shutdown_timeout_secs, 60);
        assert_eq!(config.events.worker_threads, 3);
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");

        assert!(toml_str.contains("[session]"));
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[events]"));
        assert!(toml_str.contains("[transport]"));
        assert!(toml_str.contains("read_timeout_ms = 1000"));
    }

    #[test]
    fn config_load_from_file() {
        let path = temp_config_path("load");
        fs::write(&path, "[events]\nworker_threads = 5\n").expect("Failed to write config");

        let loaded = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded.events.worker_threads, 5);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn config_load_rejects_zero_workers() {
        let path = temp_config_path("invalid");
        fs::write(&path, "[events]\nworker_threads = 0\n").expect("Failed to write config");

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn config_load_missing_file_fails() {
        let path = PathBuf::from("/nonexistent/path/config.toml");
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn config_parse_error() {
        let path = temp_config_path("parse");
        fs::write(&path, "[session]\nread_timeout_ms = \"soon\"\n").expect("Failed to write config");

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn config_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.session.read_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.registry.shutdown_poll_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transport.scan_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scan_interval_ms"));
    }

    #[test]
    fn config_path_is_under_app_dir() {
        if let Ok(path) = config_path() {
            assert!(path.to_string_lossy().contains("analog-keys"));
            assert!(path.to_string_lossy().ends_with("config.toml"));
        }
    }
}
