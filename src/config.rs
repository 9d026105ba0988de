//! Application configuration
//!
//! Loaded from an optional TOML file (`~/.config/smhiwx/config.toml` on
//! Linux). Every field has a default, so a partial file or no file at all
//! is valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::extract::DEFAULT_OBJECT_BUFFER;
use crate::smhi::{DEFAULT_PROBE_PERIOD, FORECAST_BASE_URL, OBSERVATIONS_BASE_URL};
use crate::stream::Pacing;

/// Name of the configuration file
const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub stream: StreamConfig,
    pub forecast: ForecastConfig,
    /// Station list to use instead of the built-in one
    pub stations_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub observations_url: String,
    pub forecast_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Wait for the first body byte, in milliseconds
    pub first_byte_timeout_ms: u64,
    /// Observation period queried when probing a station
    pub probe_period: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            observations_url: OBSERVATIONS_BASE_URL.to_string(),
            forecast_url: FORECAST_BASE_URL.to_string(),
            request_timeout_secs: 15,
            connect_timeout_secs: 5,
            first_byte_timeout_ms: 3000,
            probe_period: DEFAULT_PROBE_PERIOD.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn first_byte_timeout(&self) -> Duration {
        Duration::from_millis(self.first_byte_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub idle_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Capture buffer for one JSON record
    pub object_buffer_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 5000,
            poll_interval_ms: 5,
            object_buffer_bytes: DEFAULT_OBJECT_BUFFER,
        }
    }
}

impl StreamConfig {
    pub fn pacing(&self) -> Pacing {
        Pacing::new(
            Duration::from_millis(self.idle_timeout_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub hourly_limit: usize,
    pub week_days: usize,
    /// UTC hour sampled for the week view
    pub noon_hour: u32,
    pub daily_days: usize,
    /// Hourly records read to build the daily ranges
    pub daily_sample_limit: usize,
    pub observation_period: String,
    pub observation_limit: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            hourly_limit: 24,
            week_days: 7,
            noon_hour: 12,
            daily_days: 7,
            daily_sample_limit: 200,
            observation_period: "latest-day".to_string(),
            observation_limit: 48,
        }
    }
}

impl Config {
    /// Default config file location, if a config directory exists
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "smhiwx").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Parses a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// used, and a missing file there yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %path.display(), "Loading config");
                Self::from_toml(&text)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            stations_file = "/tmp/stations.json"

            [stream]
            idle_timeout_ms = 2000

            [forecast]
            week_days = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.stream.idle_timeout_ms, 2000);
        assert_eq!(config.stream.poll_interval_ms, 5);
        assert_eq!(config.forecast.week_days, 5);
        assert_eq!(config.forecast.hourly_limit, 24);
        assert_eq!(config.api.probe_period, DEFAULT_PROBE_PERIOD);
        assert_eq!(config.stations_file, Some(PathBuf::from("/tmp/stations.json")));
        assert_eq!(config.stream.pacing().idle_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml("[stream]\nidle_timeout_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));

        let present = dir.path().join("config.toml");
        fs::write(&present, "[api]\nrequest_timeout_secs = 30\n").unwrap();
        let config = Config::load(Some(&present)).unwrap();
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
    }
}
