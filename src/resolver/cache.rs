//! Per-station parameter availability caches
//!
//! The positive cache maps a station id to what it reports; the negative
//! cache remembers stations whose primary probe failed. An id is in at
//! most one of the two at any time.

use std::collections::{HashMap, HashSet};

/// What a station is known to report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StationAvailability {
    /// Whether the primary probe confirmed data
    pub has_primary: bool,
    /// Catalog indices of available parameters, ascending
    pub parameter_indices: Vec<usize>,
}

/// Sizes of both caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub available: usize,
    pub unavailable: usize,
}

/// Positive and negative station availability caches
#[derive(Debug, Clone, Default)]
pub struct AvailabilityCache {
    available: HashMap<String, StationAvailability>,
    unavailable: HashSet<String>,
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached availability for `station_id`
    pub fn get(&self, station_id: &str) -> Option<&StationAvailability> {
        self.available.get(station_id)
    }

    /// Whether `station_id` is marked as having no data
    pub fn is_unavailable(&self, station_id: &str) -> bool {
        self.unavailable.contains(station_id)
    }

    /// Stores availability for a station, clearing any negative entry.
    ///
    /// Parameter indices are sorted and deduplicated.
    pub fn insert(&mut self, station_id: &str, mut availability: StationAvailability) {
        availability.parameter_indices.sort_unstable();
        availability.parameter_indices.dedup();
        self.unavailable.remove(station_id);
        self.available.insert(station_id.to_string(), availability);
    }

    /// Marks a station as having no data, dropping any positive entry
    pub fn mark_unavailable(&mut self, station_id: &str) {
        self.available.remove(station_id);
        self.unavailable.insert(station_id.to_string());
    }

    /// Empties both caches
    pub fn clear(&mut self) {
        self.available.clear();
        self.unavailable.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            available: self.available.len(),
            unavailable: self.unavailable.len(),
        }
    }
}
