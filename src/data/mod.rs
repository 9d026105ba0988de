//! Core data models for smhiwx
//!
//! This module contains the data types shared by the parser, the station
//! resolver and the renderer: stations, weather records and the weather
//! symbol classification.

pub mod parameters;
pub mod stations;

pub use parameters::{ParameterCatalog, ParameterInfo, PRIMARY_PARAMETER};
pub use stations::{
    city_for_station, filter_cities, AliasTable, StationList, StationListError, TOP_CITIES,
};

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A meteorological observation station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// SMHI station identifier (e.g. "98230")
    pub id: String,
    /// Display name as published by SMHI
    pub name: String,
    /// Latitude coordinate
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude coordinate
    #[serde(alias = "lon")]
    pub longitude: f64,
}

/// One sample of a weather time series
///
/// Timestamps are UTC. Forecast records carry a Wsymb2 symbol code,
/// observation records usually do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Calendar date (UTC)
    pub date: NaiveDate,
    /// Time of day (UTC) when the source provides one
    pub time: Option<NaiveTime>,
    /// Primary value (temperature or the selected parameter)
    pub value: f64,
    /// Wsymb2 weather symbol code (1-27)
    pub symbol: Option<u8>,
}

impl WeatherRecord {
    /// Hour of day, if the record has a time
    pub fn hour(&self) -> Option<u32> {
        self.time.map(|t| t.hour())
    }

    /// Weather condition derived from the symbol code
    pub fn condition(&self) -> Condition {
        self.symbol.map(Condition::from_wsymb2).unwrap_or(Condition::Unknown)
    }
}

/// Weather condition groups of the SMHI Wsymb2 codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Rain,
    Thunder,
    Sleet,
    Snow,
    Unknown,
}

impl Condition {
    /// Map a Wsymb2 code to its condition group
    ///
    /// - 1: Clear sky
    /// - 2-4: Partly cloudy
    /// - 5-7: Cloudy, overcast, fog
    /// - 8-10, 18-20: Rain
    /// - 11, 21: Thunder
    /// - 12-14, 22-24: Sleet
    /// - 15-17, 25-27: Snow
    pub fn from_wsymb2(code: u8) -> Self {
        match code {
            1 => Condition::Clear,
            2..=4 => Condition::PartlyCloudy,
            5..=7 => Condition::Cloudy,
            8..=10 | 18..=20 => Condition::Rain,
            11 | 21 => Condition::Thunder,
            12..=14 | 22..=24 => Condition::Sleet,
            15..=17 | 25..=27 => Condition::Snow,
            _ => Condition::Unknown,
        }
    }

    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Condition::Clear => "Clear",
            Condition::PartlyCloudy => "Partly cloudy",
            Condition::Cloudy => "Cloudy",
            Condition::Rain => "Rain",
            Condition::Thunder => "Thunder",
            Condition::Sleet => "Sleet",
            Condition::Snow => "Snow",
            Condition::Unknown => "?",
        }
    }
}

/// Daily temperature range for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRange {
    pub date: NaiveDate,
    pub min: f64,
    pub max: f64,
    /// Symbol at the hour closest to noon, if any sample had one
    pub symbol: Option<u8>,
}

/// Summarises hourly records into per-day ranges.
///
/// Only days strictly after `today` are kept, up to `max_days`. Records
/// must be in chronological order; the result is ordered by date.
pub fn daily_ranges(records: &[WeatherRecord], today: NaiveDate, max_days: usize) -> Vec<DayRange> {
    let mut days: BTreeMap<NaiveDate, (DayRange, u32)> = BTreeMap::new();

    for record in records.iter().filter(|r| r.date > today) {
        let distance = record.hour().map(|h| h.abs_diff(12)).unwrap_or(u32::MAX);
        let entry = days.entry(record.date).or_insert_with(|| {
            (
                DayRange {
                    date: record.date,
                    min: record.value,
                    max: record.value,
                    symbol: None,
                },
                u32::MAX,
            )
        });
        let (range, best_distance) = entry;
        range.min = range.min.min(record.value);
        range.max = range.max.max(record.value);
        if record.symbol.is_some() && (range.symbol.is_none() || distance < *best_distance) {
            range.symbol = record.symbol;
            *best_distance = distance;
        }
    }

    days.into_values().map(|(range, _)| range).take(max_days).collect()
}
