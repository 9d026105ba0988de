//! Persisted user settings
//!
//! Settings are namespaced key/value pairs behind the [`SettingsStore`]
//! trait. The last explicitly saved selection lives in the `weather`
//! namespace and is read back at startup.

mod store;

pub use store::JsonFileStore;

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Namespace holding the saved selection
pub const NAMESPACE: &str = "weather";

const KEY_STATION_ID: &str = "station_id";
const KEY_PARAM_CODE: &str = "param_code";
const KEY_CITY_NAME: &str = "city_name";

/// namespace -> key -> value
pub(crate) type Namespaces = BTreeMap<String, BTreeMap<String, Value>>;

/// Errors that can occur when persisting settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be written
    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be serialized
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No config directory for this platform
    #[error("could not determine the config directory")]
    NoConfigDir,
}

/// Namespaced key/value settings
pub trait SettingsStore {
    fn get_string(&self, namespace: &str, key: &str) -> Option<String>;
    fn get_int(&self, namespace: &str, key: &str) -> Option<i64>;
    fn put_string(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), SettingsError>;
    fn put_int(&mut self, namespace: &str, key: &str, value: i64) -> Result<(), SettingsError>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for Box<S> {
    fn get_string(&self, namespace: &str, key: &str) -> Option<String> {
        (**self).get_string(namespace, key)
    }

    fn get_int(&self, namespace: &str, key: &str) -> Option<i64> {
        (**self).get_int(namespace, key)
    }

    fn put_string(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        (**self).put_string(namespace, key, value)
    }

    fn put_int(&mut self, namespace: &str, key: &str, value: i64) -> Result<(), SettingsError> {
        (**self).put_int(namespace, key, value)
    }
}

/// In-memory settings, lost when dropped
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Namespaces,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn value(&self, namespace: &str, key: &str) -> Option<&Value> {
        self.values.get(namespace)?.get(key)
    }

    fn put(&mut self, namespace: &str, key: &str, value: Value) {
        self.values
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

impl SettingsStore for MemoryStore {
    fn get_string(&self, namespace: &str, key: &str) -> Option<String> {
        self.value(namespace, key)?.as_str().map(str::to_string)
    }

    fn get_int(&self, namespace: &str, key: &str) -> Option<i64> {
        self.value(namespace, key)?.as_i64()
    }

    fn put_string(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        self.put(namespace, key, Value::from(value));
        Ok(())
    }

    fn put_int(&mut self, namespace: &str, key: &str, value: i64) -> Result<(), SettingsError> {
        self.put(namespace, key, Value::from(value));
        Ok(())
    }
}

/// The selection written by "save defaults"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSelection {
    pub station_id: String,
    pub param_code: u32,
    /// City label; older saves may not have one
    pub city_name: Option<String>,
}

impl SavedSelection {
    /// Reads the saved selection, if a station id was ever saved.
    ///
    /// A missing or invalid parameter code reads as the primary parameter.
    pub fn load<S: SettingsStore + ?Sized>(store: &S) -> Option<Self> {
        let station_id = store
            .get_string(NAMESPACE, KEY_STATION_ID)
            .filter(|id| !id.is_empty())?;
        let param_code = store
            .get_int(NAMESPACE, KEY_PARAM_CODE)
            .and_then(|code| u32::try_from(code).ok())
            .unwrap_or(crate::data::PRIMARY_PARAMETER);
        let city_name = store
            .get_string(NAMESPACE, KEY_CITY_NAME)
            .filter(|name| !name.is_empty());
        Some(Self {
            station_id,
            param_code,
            city_name,
        })
    }

    pub fn save<S: SettingsStore + ?Sized>(&self, store: &mut S) -> Result<(), SettingsError> {
        store.put_string(NAMESPACE, KEY_STATION_ID, &self.station_id)?;
        store.put_int(NAMESPACE, KEY_PARAM_CODE, i64::from(self.param_code))?;
        store.put_string(NAMESPACE, KEY_CITY_NAME, self.city_name.as_deref().unwrap_or(""))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_selection_round_trip() {
        let mut store = MemoryStore::new();
        let saved = SavedSelection {
            station_id: "71420".to_string(),
            param_code: 6,
            city_name: Some("Goteborg".to_string()),
        };
        saved.save(&mut store).unwrap();
        assert_eq!(SavedSelection::load(&store), Some(saved));
    }

    #[test]
    fn test_load_without_station_is_none() {
        let mut store = MemoryStore::new();
        assert_eq!(SavedSelection::load(&store), None);
        store.put_int(NAMESPACE, KEY_PARAM_CODE, 4).unwrap();
        assert_eq!(SavedSelection::load(&store), None);
    }

    #[test]
    fn test_load_defaults_missing_fields() {
        let mut store = MemoryStore::new();
        store.put_string(NAMESPACE, KEY_STATION_ID, "98230").unwrap();
        store.put_int(NAMESPACE, KEY_PARAM_CODE, -3).unwrap();
        store.put_string(NAMESPACE, KEY_CITY_NAME, "").unwrap();

        let saved = SavedSelection::load(&store).unwrap();
        assert_eq!(saved.param_code, crate::data::PRIMARY_PARAMETER);
        assert_eq!(saved.city_name, None);
    }
}
