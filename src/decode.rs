//! Decodes a single captured JSON object into a record
//!
//! Each layout deserialises into a small struct that names only the fields
//! it needs; serde skips everything else, and parameter value arrays keep
//! only their first element. Decoding one object therefore needs a small,
//! fixed amount of memory no matter how large the full response is.
//!
//! Numbers are accepted in any of the encodings SMHI uses: JSON strings
//! ("18.7"), integers and floats.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::{self, Deserializer, IgnoredAny, SeqAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when decoding one record
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The object is not valid JSON or has the wrong shape
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    /// No usable timestamp field was present
    #[error("record has no timestamp")]
    MissingTimestamp,

    /// A timestamp was present but could not be parsed
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Which parameters to take from a `timeSeries` entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterPick {
    /// Parameter carrying the primary value; `None` takes the first one
    pub value: Option<String>,
    /// Parameter carrying the weather symbol, when symbols are modelled
    pub symbol: Option<String>,
}

impl ParameterPick {
    /// Temperature plus Wsymb2 symbol, as used by the point forecast
    pub fn forecast() -> Self {
        Self {
            value: Some("t".to_string()),
            symbol: Some("Wsymb2".to_string()),
        }
    }
}

/// Record shape of a response, selected once per fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLayout {
    /// Observation array under `"value"`: `{date|ref|from, value}`
    ValueArray,
    /// `"timeSeries"` array: `{validTime, parameters: [{name, values}]}`
    TimeSeries(ParameterPick),
}

/// Fields extracted from one object before domain filtering
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub value: Option<f64>,
    pub symbol: Option<u8>,
}

impl RecordLayout {
    /// Literal key marker that precedes this layout's array
    pub fn marker(&self) -> &'static [u8] {
        match self {
            RecordLayout::ValueArray => b"\"value\"",
            RecordLayout::TimeSeries(_) => b"\"timeSeries\"",
        }
    }

    /// Whether records of this layout must carry a symbol
    pub fn requires_symbol(&self) -> bool {
        matches!(self, RecordLayout::TimeSeries(pick) if pick.symbol.is_some())
    }

    /// Decodes one captured object.
    ///
    /// # Errors
    /// Returns [`DecodeError`] when the object is malformed or has no
    /// parseable timestamp. Missing values are reported as `None`, not as
    /// errors.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedRecord, DecodeError> {
        match self {
            RecordLayout::ValueArray => decode_value_entry(bytes),
            RecordLayout::TimeSeries(pick) => decode_series_entry(bytes, pick),
        }
    }
}

fn decode_value_entry(bytes: &[u8]) -> Result<DecodedRecord, DecodeError> {
    let entry: ValueEntry = serde_json::from_slice(bytes)?;
    let stamp = entry
        .date
        .or(entry.reference)
        .or(entry.from)
        .ok_or(DecodeError::MissingTimestamp)?;
    let (date, time) = stamp.resolve()?;

    Ok(DecodedRecord {
        date,
        time,
        value: entry.value.0,
        symbol: None,
    })
}

fn decode_series_entry(bytes: &[u8], pick: &ParameterPick) -> Result<DecodedRecord, DecodeError> {
    let entry: SeriesEntry = serde_json::from_slice(bytes)?;
    let valid_time = entry
        .valid_time
        .as_deref()
        .ok_or(DecodeError::MissingTimestamp)?;
    let (date, time) = parse_timestamp(valid_time)?;

    let value = match &pick.value {
        Some(name) => entry.first_value_of(name),
        None => entry.parameters.first().and_then(|p| p.values.0),
    };
    let symbol = pick
        .symbol
        .as_deref()
        .and_then(|name| entry.first_value_of(name))
        .and_then(symbol_code);

    Ok(DecodedRecord {
        date,
        time,
        value,
        symbol,
    })
}

fn symbol_code(raw: f64) -> Option<u8> {
    let rounded = raw.round();
    (0.0..=255.0).contains(&rounded).then_some(rounded as u8)
}

/// Allowlist for observation `"value"` entries
#[derive(Debug, Deserialize)]
struct ValueEntry {
    #[serde(default)]
    date: Option<RawTimestamp>,
    #[serde(default, rename = "ref")]
    reference: Option<RawTimestamp>,
    #[serde(default)]
    from: Option<RawTimestamp>,
    #[serde(default)]
    value: Flex,
}

/// Allowlist for `"timeSeries"` entries
#[derive(Debug, Deserialize)]
struct SeriesEntry {
    #[serde(default, rename = "validTime", alias = "time")]
    valid_time: Option<String>,
    #[serde(default)]
    parameters: Vec<SeriesParameter>,
}

impl SeriesEntry {
    fn first_value_of(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.values.0)
    }
}

#[derive(Debug, Deserialize)]
struct SeriesParameter {
    #[serde(default)]
    name: String,
    #[serde(default)]
    values: FirstValue,
}

/// Timestamp as epoch milliseconds or as text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    fn resolve(self) -> Result<(NaiveDate, Option<NaiveTime>), DecodeError> {
        match self {
            RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .map(|dt| {
                    let naive = dt.naive_utc();
                    (naive.date(), Some(naive.time()))
                })
                .ok_or_else(|| DecodeError::InvalidTimestamp(ms.to_string())),
            RawTimestamp::Text(text) => match text.trim().parse::<i64>() {
                Ok(ms) => RawTimestamp::Millis(ms).resolve(),
                Err(_) => parse_timestamp(&text),
            },
        }
    }
}

/// Parses an SMHI timestamp string as UTC.
///
/// Accepts RFC 3339 (`2024-07-15T12:00:00Z`), naive date-times with `T` or a
/// space separator, minute-resolution date-times and plain dates. Plain
/// dates have no time of day.
pub fn parse_timestamp(text: &str) -> Result<(NaiveDate, Option<NaiveTime>), DecodeError> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        let naive = dt.naive_utc();
        return Ok((naive.date(), Some(naive.time())));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok((naive.date(), Some(naive.time())));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|date| (date, None))
        .map_err(|_| DecodeError::InvalidTimestamp(text.to_string()))
}

/// A number that may arrive as a JSON string, integer or float.
///
/// Non-numeric strings decode as `0.0`; `null` or an absent field as `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flex(pub Option<f64>);

struct FlexVisitor;

impl<'de> Visitor<'de> for FlexVisitor {
    type Value = Flex;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, a numeric string or null")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Flex, E> {
        Ok(Flex(Some(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Flex, E> {
        Ok(Flex(Some(v as f64)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Flex, E> {
        Ok(Flex(Some(v as f64)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Flex, E> {
        Ok(Flex(Some(v.trim().parse::<f64>().unwrap_or(0.0))))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Flex, E> {
        Ok(Flex(None))
    }

    fn visit_none<E: de::Error>(self) -> Result<Flex, E> {
        Ok(Flex(None))
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Flex, D::Error> {
        d.deserialize_any(FlexVisitor)
    }
}

impl<'de> Deserialize<'de> for Flex {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(FlexVisitor)
    }
}

/// First element of a values array; the rest are skipped unstored
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct FirstValue(Option<f64>);

struct FirstValueVisitor;

impl<'de> Visitor<'de> for FirstValueVisitor {
    type Value = FirstValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of numbers")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FirstValue, A::Error> {
        let first = seq.next_element::<Flex>()?.and_then(|flex| flex.0);
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(FirstValue(first))
    }

    fn visit_unit<E: de::Error>(self) -> Result<FirstValue, E> {
        Ok(FirstValue(None))
    }
}

impl<'de> Deserialize<'de> for FirstValue {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(FirstValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(json: &str) -> Option<f64> {
        RecordLayout::ValueArray.decode(json.as_bytes()).unwrap().value
    }

    #[test]
    fn test_value_accepts_string_float_and_int() {
        let s = value_of(r#"{"date":1721044800000,"value":"18.7","quality":"G"}"#).unwrap();
        let f = value_of(r#"{"date":1721044800000,"value":18.7}"#).unwrap();
        let i = value_of(r#"{"date":1721044800000,"value":18}"#).unwrap();
        assert!((s - 18.7).abs() < 1e-9);
        assert!((f - 18.7).abs() < 1e-9);
        assert!((i - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_numeric_string_is_zero_and_null_is_absent() {
        assert_eq!(value_of(r#"{"date":1721044800000,"value":"n/a"}"#), Some(0.0));
        assert_eq!(value_of(r#"{"date":1721044800000,"value":null}"#), None);
        assert_eq!(value_of(r#"{"date":1721044800000}"#), None);
    }

    #[test]
    fn test_epoch_millis_timestamp() {
        let rec = RecordLayout::ValueArray
            .decode(br#"{"date":1721044800000,"value":"1.0"}"#)
            .unwrap();
        assert_eq!(rec.date, NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
        assert_eq!(rec.time, NaiveTime::from_hms_opt(12, 0, 0));
    }

    #[test]
    fn test_ref_date_has_no_time() {
        let rec = RecordLayout::ValueArray
            .decode(br#"{"from":1720994400000,"to":1721080799000,"ref":"2024-07-15","value":"14.2"}"#)
            .unwrap();
        assert_eq!(rec.date, NaiveDate::from_ymd_opt(2024, 7, 15).unwrap());
        assert_eq!(rec.time, None);
    }

    #[test]
    fn test_missing_timestamp_is_an_error() {
        let err = RecordLayout::ValueArray.decode(br#"{"value":"1.0"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingTimestamp));
    }

    #[test]
    fn test_malformed_object_is_an_error() {
        let err = RecordLayout::ValueArray.decode(br#"{"date":1,"value":"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_forecast_entry_picks_named_parameters() {
        let json = r#"{
            "validTime":"2024-07-15T12:00:00Z",
            "parameters":[
                {"name":"msl","levelType":"hmsl","level":0,"unit":"hPa","values":[1012.3]},
                {"name":"t","levelType":"hl","level":2,"unit":"Cel","values":[21.4, 99.0]},
                {"name":"Wsymb2","levelType":"hl","level":0,"unit":"category","values":[3]}
            ]
        }"#;
        let rec = RecordLayout::TimeSeries(ParameterPick::forecast())
            .decode(json.as_bytes())
            .unwrap();
        assert_eq!(rec.time, NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(rec.value, Some(21.4));
        assert_eq!(rec.symbol, Some(3));
    }

    #[test]
    fn test_forecast_entry_missing_symbol() {
        let json = r#"{"validTime":"2024-07-15T12:00:00Z","parameters":[{"name":"t","values":[21.4]}]}"#;
        let rec = RecordLayout::TimeSeries(ParameterPick::forecast())
            .decode(json.as_bytes())
            .unwrap();
        assert_eq!(rec.value, Some(21.4));
        assert_eq!(rec.symbol, None);
    }

    #[test]
    fn test_forecast_entry_without_valid_time_is_an_error() {
        let json = r#"{"parameters":[{"name":"t","values":[21.4]},{"name":"Wsymb2","values":[1]}]}"#;
        let err = RecordLayout::TimeSeries(ParameterPick::forecast())
            .decode(json.as_bytes())
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingTimestamp));
    }

    #[test]
    fn test_unnamed_pick_takes_first_parameter() {
        let json = r#"{"validTime":"2024-07-15T06:00:00Z","parameters":[{"name":"ws","values":["4.5"]}]}"#;
        let rec = RecordLayout::TimeSeries(ParameterPick::default())
            .decode(json.as_bytes())
            .unwrap();
        assert_eq!(rec.value, Some(4.5));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0);
        assert_eq!(parse_timestamp("2024-07-15T12:00:00Z").unwrap(), (date, noon));
        assert_eq!(parse_timestamp("2024-07-15T14:00:00+02:00").unwrap(), (date, noon));
        assert_eq!(parse_timestamp("2024-07-15 12:00:00").unwrap(), (date, noon));
        assert_eq!(parse_timestamp("2024-07-15T12:00").unwrap(), (date, noon));
        assert_eq!(parse_timestamp("2024-07-15").unwrap(), (date, None));
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_layout_markers() {
        assert_eq!(RecordLayout::ValueArray.marker(), b"\"value\"");
        assert!(RecordLayout::TimeSeries(ParameterPick::forecast()).requires_symbol());
        assert!(!RecordLayout::TimeSeries(ParameterPick::default()).requires_symbol());
        assert!(!RecordLayout::ValueArray.requires_symbol());
    }
}
