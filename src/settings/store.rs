//! JSON file settings store
//!
//! Stores namespaced key/value settings in a single JSON file in the
//! platform config directory (`~/.config/smhiwx/weather.json` on Linux).
//! The file is read once when the store opens and rewritten on every put.

use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{Namespaces, SettingsError, SettingsStore};

/// File name of the settings file inside the config directory
const SETTINGS_FILE: &str = "weather.json";

/// Settings persisted to a JSON file
///
/// An unreadable or corrupt file is treated as empty so a bad settings
/// file never prevents startup; it is replaced on the next save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Namespaces,
}

impl JsonFileStore {
    /// Opens the store at the default location
    ///
    /// Returns [`SettingsError::NoConfigDir`] if the config directory
    /// cannot be determined (e.g., no home directory).
    pub fn open_default() -> Result<Self, SettingsError> {
        let project_dirs = ProjectDirs::from("", "", "smhiwx").ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::open(project_dirs.config_dir().join(SETTINGS_FILE)))
    }

    /// Opens the store at a custom path
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt settings file");
                Namespaces::new()
            }),
            Err(_) => {
                debug!(path = %path.display(), "No settings file yet");
                Namespaces::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn put(&mut self, namespace: &str, key: &str, value: Value) -> Result<(), SettingsError> {
        self.values
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn value(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.values.get(namespace)?.get(key)
    }
}

impl SettingsStore for JsonFileStore {
    fn get_string(&self, namespace: &str, key: &str) -> Option<String> {
        self.value(namespace, key)?.as_str().map(str::to_string)
    }

    fn get_int(&self, namespace: &str, key: &str) -> Option<i64> {
        self.value(namespace, key)?.as_i64()
    }

    fn put_string(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        self.put(namespace, key, Value::from(value))
    }

    fn put_int(&mut self, namespace: &str, key: &str, value: i64) -> Result<(), SettingsError> {
        self.put(namespace, key, Value::from(value))
    }
}
