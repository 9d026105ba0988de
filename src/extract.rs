//! Drives the object reader and decoder over a full response
//!
//! Extraction is a single forward pass: scan for the array key, step past
//! its `[`, then read and decode one object at a time until the record
//! limit is reached, the array ends, or the stream fails. Records that fail
//! to decode or do not carry the required values are dropped without
//! ending the pass.

use chrono::{NaiveDate, Timelike};
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::WeatherRecord;
use crate::decode::{DecodedRecord, RecordLayout};
use crate::stream::{ByteSource, ObjectReader, Pacing, ReadOutcome, StreamError};

/// Default size of the per-object capture buffer
pub const DEFAULT_OBJECT_BUFFER: usize = 4096;

/// Errors that can occur during extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    /// None of the expected array keys appeared in the stream
    #[error("array marker not found: {0}")]
    MarkerNotFound(#[source] StreamError),

    /// The array was found but no record was accepted
    #[error("no records accepted")]
    NoRecords,
}

/// Which decoded records are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Every successfully decoded record, in stream order
    Unfiltered,
    /// The first record of each calendar day whose hour equals `hour`
    DailyAtHour { hour: u32 },
}

/// What to extract from one response
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// Candidate layouts; the first whose key appears in the stream wins
    pub layouts: Vec<RecordLayout>,
    /// Maximum number of records to accept
    pub limit: usize,
    pub policy: SelectionPolicy,
}

impl ExtractRequest {
    /// Request for a single layout
    pub fn new(layout: RecordLayout, limit: usize, policy: SelectionPolicy) -> Self {
        Self {
            layouts: vec![layout],
            limit,
            policy,
        }
    }
}

/// Tracks the per-day dedup state of [`SelectionPolicy::DailyAtHour`]
#[derive(Debug, Default)]
struct Selector {
    last_date: Option<NaiveDate>,
}

impl Selector {
    fn accept(&mut self, policy: SelectionPolicy, record: &DecodedRecord) -> bool {
        match policy {
            SelectionPolicy::Unfiltered => true,
            SelectionPolicy::DailyAtHour { hour } => {
                let at_hour = record
                    .time
                    .map(|t| t.hour() == hour)
                    .unwrap_or(false);
                at_hour && self.last_date != Some(record.date)
            }
        }
    }
}

/// Streams typed weather records out of a JSON response
#[derive(Debug, Clone)]
pub struct TimeSeriesExtractor {
    reader: ObjectReader,
    buffer_size: usize,
}

impl Default for TimeSeriesExtractor {
    fn default() -> Self {
        Self::new(Pacing::default(), DEFAULT_OBJECT_BUFFER)
    }
}

impl TimeSeriesExtractor {
    /// Creates an extractor with the given pacing and capture buffer size
    pub fn new(pacing: Pacing, buffer_size: usize) -> Self {
        Self {
            reader: ObjectReader::new(pacing),
            buffer_size,
        }
    }

    /// Timing policy used while waiting for bytes
    pub fn pacing(&self) -> &Pacing {
        self.reader.pacing()
    }

    /// Locates the array for one of `layouts` and returns the layout chosen.
    ///
    /// Consumes the stream up to and including the array's opening `[`.
    pub fn locate<'a, S>(&self, src: &mut S, layouts: &'a [RecordLayout]) -> Result<&'a RecordLayout, ExtractError>
    where
        S: ByteSource + ?Sized,
    {
        let markers: Vec<&[u8]> = layouts.iter().map(RecordLayout::marker).collect();
        let idx = src
            .find_any(&markers, self.pacing())
            .map_err(ExtractError::MarkerNotFound)?;
        src.find(b"[", self.pacing())
            .map_err(ExtractError::MarkerNotFound)?;
        // find_any only returns indices of `markers`, which mirrors `layouts`
        layouts
            .get(idx)
            .ok_or(ExtractError::MarkerNotFound(StreamError::Closed))
    }

    /// Extracts records from `src` according to `request`.
    ///
    /// # Errors
    /// [`ExtractError::MarkerNotFound`] when no array key is found and
    /// [`ExtractError::NoRecords`] when the pass accepted nothing. Timeouts
    /// and closed streams after the array starts end the pass normally.
    pub fn extract<S>(&self, src: &mut S, request: &ExtractRequest) -> Result<Vec<WeatherRecord>, ExtractError>
    where
        S: ByteSource + ?Sized,
    {
        let layout = self.locate(src, &request.layouts)?;
        let mut buf = vec![0u8; self.buffer_size];
        let mut selector = Selector::default();
        let mut records = Vec::new();
        let mut skipped = 0usize;

        while records.len() < request.limit {
            let len = match self.reader.read_next_object(src, &mut buf) {
                Ok(ReadOutcome::Object(len)) => len,
                Ok(ReadOutcome::EndOfArray) => break,
                Ok(ReadOutcome::Overflow { size }) => {
                    debug!(size, capacity = self.buffer_size, "Skipping oversized record");
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, accepted = records.len(), "Stream ended during extraction");
                    break;
                }
            };

            let decoded = match layout.decode(&buf[..len]) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable record");
                    skipped += 1;
                    continue;
                }
            };

            if !selector.accept(request.policy, &decoded) {
                continue;
            }

            let symbol_ok = !layout.requires_symbol() || decoded.symbol.is_some();
            let Some(value) = decoded.value.filter(|_| symbol_ok) else {
                skipped += 1;
                continue;
            };

            selector.last_date = Some(decoded.date);
            records.push(WeatherRecord {
                date: decoded.date,
                time: decoded.time,
                value,
                symbol: decoded.symbol,
            });
        }

        debug!(accepted = records.len(), skipped, "Extraction finished");
        if records.is_empty() {
            return Err(ExtractError::NoRecords);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ParameterPick;
    use crate::stream::SliceSource;
    use chrono::{Duration as ChronoDuration, NaiveDateTime};
    use std::time::Duration;

    fn extractor(buffer: usize) -> TimeSeriesExtractor {
        TimeSeriesExtractor::new(
            Pacing::new(Duration::from_millis(50), Duration::from_millis(1)),
            buffer,
        )
    }

    fn forecast_entry(at: NaiveDateTime, t: f64, symbol: u8) -> String {
        format!(
            r#"{{"validTime":"{}Z","parameters":[{{"name":"t","levelType":"hl","level":2,"unit":"Cel","values":[{}]}},{{"name":"Wsymb2","levelType":"hl","level":0,"unit":"category","values":[{}]}}]}}"#,
            at.format("%Y-%m-%dT%H:%M:%S"),
            t,
            symbol
        )
    }

    /// Forecast document with `days` days of hourly entries
    fn forecast_document(days: i64) -> String {
        let start = NaiveDate::from_ymd_opt(2024, 7, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let entries: Vec<String> = (0..days * 24)
            .map(|h| forecast_entry(start + ChronoDuration::hours(h), 10.0 + (h % 24) as f64, 3))
            .collect();
        format!(
            r#"{{"approvedTime":"2024-07-15T00:00:00Z","geometry":{{"type":"Point","coordinates":[[18.05,59.34]]}},"timeSeries":[{}]}}"#,
            entries.join(",")
        )
    }

    fn forecast_request(limit: usize, policy: SelectionPolicy) -> ExtractRequest {
        ExtractRequest::new(RecordLayout::TimeSeries(ParameterPick::forecast()), limit, policy)
    }

    #[test]
    fn test_daily_at_hour_yields_one_record_per_day() {
        let mut src = SliceSource::new(forecast_document(10));
        let records = extractor(DEFAULT_OBJECT_BUFFER)
            .extract(&mut src, &forecast_request(7, SelectionPolicy::DailyAtHour { hour: 12 }))
            .unwrap();

        assert_eq!(records.len(), 7);
        assert!(records.windows(2).all(|w| w[0].date < w[1].date));
        assert!(records.iter().all(|r| r.hour() == Some(12)));
        assert!(records.iter().all(|r| (r.value - 22.0).abs() < 1e-9));
    }

    #[test]
    fn test_unfiltered_stops_at_limit() {
        let mut src = SliceSource::new(forecast_document(2));
        let records = extractor(DEFAULT_OBJECT_BUFFER)
            .extract(&mut src, &forecast_request(24, SelectionPolicy::Unfiltered))
            .unwrap();
        assert_eq!(records.len(), 24);
        assert_eq!(records[0].hour(), Some(0));
        assert_eq!(records[23].hour(), Some(23));
    }

    #[test]
    fn test_partial_records_are_dropped() {
        let doc = r#"{"timeSeries":[
            {"validTime":"2024-07-15T10:00:00Z","parameters":[{"name":"t","values":[15.0]}]},
            {"validTime":"2024-07-15T11:00:00Z","parameters":[{"name":"t","values":[16.0]},{"name":"Wsymb2","values":[1]}]},
            {"validTime":"2024-07-15T12:00:00Z","parameters":[{"name":"Wsymb2","values":[2]}]}
        ]}"#;
        let mut src = SliceSource::new(doc);
        let records = extractor(512)
            .extract(&mut src, &forecast_request(24, SelectionPolicy::Unfiltered))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, Some(1));
    }

    #[test]
    fn test_bad_records_do_not_stop_extraction() {
        let doc = format!(
            r#"{{"value":[{{"date":"garbage","value":"1"}},{{"pad":"{}"}},{{"date":1721044800000,"value":"2.5"}}]}}"#,
            "x".repeat(200)
        );
        let mut src = SliceSource::new(doc);
        let records = extractor(64)
            .extract(
                &mut src,
                &ExtractRequest::new(RecordLayout::ValueArray, 10, SelectionPolicy::Unfiltered),
            )
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!((records[0].value - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_marker_fails() {
        let mut src = SliceSource::new(r#"{"something":"else"}"#);
        let err = extractor(64)
            .extract(&mut src, &forecast_request(24, SelectionPolicy::Unfiltered))
            .unwrap_err();
        assert!(matches!(err, ExtractError::MarkerNotFound(_)));
    }

    #[test]
    fn test_empty_array_fails_with_no_records() {
        let mut src = SliceSource::new(r#"{"value":[]}"#);
        let err = extractor(64)
            .extract(
                &mut src,
                &ExtractRequest::new(RecordLayout::ValueArray, 10, SelectionPolicy::Unfiltered),
            )
            .unwrap_err();
        assert!(matches!(err, ExtractError::NoRecords));
    }

    #[test]
    fn test_truncated_stream_keeps_records_read_so_far() {
        let doc = r#"{"value":[{"date":1721044800000,"value":"1.5"},{"date":1721048400000,"val"#;
        let mut src = SliceSource::new(doc);
        let records = extractor(128)
            .extract(
                &mut src,
                &ExtractRequest::new(RecordLayout::ValueArray, 10, SelectionPolicy::Unfiltered),
            )
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_layout_chosen_by_first_marker() {
        let doc = r#"{"timeSeries":[{"validTime":"2024-07-15T06:00:00Z","parameters":[{"name":"ws","values":[3.5]}]}]}"#;
        let request = ExtractRequest {
            layouts: vec![
                RecordLayout::ValueArray,
                RecordLayout::TimeSeries(ParameterPick::default()),
            ],
            limit: 10,
            policy: SelectionPolicy::Unfiltered,
        };
        let mut src = SliceSource::new(doc);
        let records = extractor(256).extract(&mut src, &request).unwrap();
        assert_eq!(records.len(), 1);
        assert!((records[0].value - 3.5).abs() < 1e-9);
        assert_eq!(records[0].symbol, None);
    }
}
