//! SMHI open-data API client
//!
//! This module builds observation and forecast URLs, issues the requests
//! through a [`Transport`] and streams the responses through the
//! [`TimeSeriesExtractor`] into [`WeatherRecord`]s. It also implements the
//! station probes the resolver uses to qualify stations.

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{daily_ranges, DayRange, StationRecord, WeatherRecord, PRIMARY_PARAMETER};
use crate::decode::{ParameterPick, RecordLayout};
use crate::extract::{ExtractError, ExtractRequest, SelectionPolicy, TimeSeriesExtractor};
use crate::resolver::StationProbe;
use crate::stream::ByteSource;
use crate::transport::{Transport, TransportError};

/// Base URL of the observation API
pub const OBSERVATIONS_BASE_URL: &str = "https://opendata-download-metobs.smhi.se/api/version/1.0";

/// Base URL of the point forecast API
pub const FORECAST_BASE_URL: &str =
    "https://opendata-download-metfcst.smhi.se/api/category/pmp3g/version/2";

/// Period queried by the primary probe; only the first record is read
pub const DEFAULT_PROBE_PERIOD: &str = "latest-months";

/// How long to wait for the first body byte before giving up
pub const DEFAULT_FIRST_BYTE_TIMEOUT: Duration = Duration::from_secs(3);

/// Errors that can occur when fetching from SMHI
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request could not be sent
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Server answered with an unexpected status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// No response body arrived in time
    #[error("response body was empty or did not arrive in time")]
    NoData,

    /// Body arrived but yielded no usable records
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// URL builders for both API families
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub observations: String,
    pub forecast: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(OBSERVATIONS_BASE_URL, FORECAST_BASE_URL)
    }
}

impl Endpoints {
    /// Creates endpoints from two base URLs (trailing slashes are ignored)
    pub fn new(observations: impl Into<String>, forecast: impl Into<String>) -> Self {
        Self {
            observations: observations.into().trim_end_matches('/').to_string(),
            forecast: forecast.into().trim_end_matches('/').to_string(),
        }
    }

    /// Observation data for one parameter, station and period
    pub fn observation_data(&self, code: u32, station_id: &str, period: &str) -> String {
        format!(
            "{}/parameter/{}/station/{}/period/{}/data.json",
            self.observations, code, station_id, period
        )
    }

    /// Metadata for one parameter at one station
    pub fn parameter_station(&self, code: u32, station_id: &str) -> String {
        format!("{}/parameter/{}/station/{}.json", self.observations, code, station_id)
    }

    /// Point forecast at the given coordinates
    pub fn point_forecast(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}/geotype/point/lon/{:.4}/lat/{:.4}/data.json",
            self.forecast, longitude, latitude
        )
    }
}

/// Client for the SMHI observation and forecast APIs
#[derive(Debug, Clone)]
pub struct SmhiClient<T> {
    transport: T,
    endpoints: Endpoints,
    extractor: TimeSeriesExtractor,
    probe_period: String,
    first_byte_timeout: Duration,
}

impl<T: Transport> SmhiClient<T> {
    /// Create a client with default endpoints and timing
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            endpoints: Endpoints::default(),
            extractor: TimeSeriesExtractor::default(),
            probe_period: DEFAULT_PROBE_PERIOD.to_string(),
            first_byte_timeout: DEFAULT_FIRST_BYTE_TIMEOUT,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_extractor(mut self, extractor: TimeSeriesExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Period used by the primary probe (e.g. "latest-hour")
    pub fn with_probe_period(mut self, period: impl Into<String>) -> Self {
        self.probe_period = period.into();
        self
    }

    pub fn with_first_byte_timeout(mut self, timeout: Duration) -> Self {
        self.first_byte_timeout = timeout;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetch the next `limit` hourly forecast records for a station
    pub fn hourly_forecast(
        &self,
        station: &StationRecord,
        limit: usize,
    ) -> Result<Vec<WeatherRecord>, FetchError> {
        let request = ExtractRequest::new(forecast_layout(), limit, SelectionPolicy::Unfiltered);
        self.fetch(&self.forecast_url(station), &request)
    }

    /// Fetch the current conditions (the first hourly forecast record)
    pub fn current(&self, station: &StationRecord) -> Result<WeatherRecord, FetchError> {
        self.hourly_forecast(station, 1)?
            .into_iter()
            .next()
            .ok_or(FetchError::Extract(ExtractError::NoRecords))
    }

    /// Fetch one sample per day at `hour` UTC, for up to `days` days
    pub fn week_forecast(
        &self,
        station: &StationRecord,
        days: usize,
        hour: u32,
    ) -> Result<Vec<WeatherRecord>, FetchError> {
        let request = ExtractRequest::new(
            forecast_layout(),
            days,
            SelectionPolicy::DailyAtHour { hour },
        );
        self.fetch(&self.forecast_url(station), &request)
    }

    /// Fetch daily min/max ranges for the days after `today`
    ///
    /// Reads at most `sample_limit` hourly records to build the ranges.
    pub fn daily(
        &self,
        station: &StationRecord,
        today: NaiveDate,
        days: usize,
        sample_limit: usize,
    ) -> Result<Vec<DayRange>, FetchError> {
        let records = self.hourly_forecast(station, sample_limit)?;
        let ranges = daily_ranges(&records, today, days);
        if ranges.is_empty() {
            return Err(FetchError::Extract(ExtractError::NoRecords));
        }
        Ok(ranges)
    }

    /// Fetch observations of parameter `code` at a station
    pub fn observations(
        &self,
        station_id: &str,
        code: u32,
        period: &str,
        limit: usize,
    ) -> Result<Vec<WeatherRecord>, FetchError> {
        let request = ExtractRequest {
            layouts: vec![
                RecordLayout::ValueArray,
                RecordLayout::TimeSeries(ParameterPick::default()),
            ],
            limit,
            policy: SelectionPolicy::Unfiltered,
        };
        let url = self.endpoints.observation_data(code, station_id, period);
        self.fetch(&url, &request)
    }

    fn forecast_url(&self, station: &StationRecord) -> String {
        self.endpoints
            .point_forecast(station.latitude, station.longitude)
    }

    fn fetch(&self, url: &str, request: &ExtractRequest) -> Result<Vec<WeatherRecord>, FetchError> {
        let mut response = self.transport.get(url)?;
        if !response.is_success() {
            debug!(url, status = response.status, "Fetch rejected");
            return Err(FetchError::Status(response.status));
        }
        self.await_body(response.body.as_mut())?;
        let records = self.extractor.extract(response.body.as_mut(), request)?;
        debug!(url, records = records.len(), "Fetch complete");
        Ok(records)
    }

    fn await_body(&self, body: &mut dyn ByteSource) -> Result<(), FetchError> {
        if body.wait_for_data(self.first_byte_timeout, self.extractor.pacing()) {
            Ok(())
        } else {
            Err(FetchError::NoData)
        }
    }
}

fn forecast_layout() -> RecordLayout {
    RecordLayout::TimeSeries(ParameterPick::forecast())
}

impl<T: Transport> StationProbe for SmhiClient<T> {
    /// Succeeds only for HTTP 200 with at least one decodable record in the
    /// `"value"` array.
    fn probe_primary(&self, station_id: &str) -> Result<(), FetchError> {
        let url = self
            .endpoints
            .observation_data(PRIMARY_PARAMETER, station_id, &self.probe_period);
        let mut response = self.transport.get(&url)?;
        if response.status != 200 {
            return Err(FetchError::Status(response.status));
        }
        self.await_body(response.body.as_mut())?;
        let request = ExtractRequest::new(RecordLayout::ValueArray, 1, SelectionPolicy::Unfiltered);
        self.extractor.extract(response.body.as_mut(), &request)?;
        info!(station = station_id, "Primary probe succeeded");
        Ok(())
    }

    fn parameter_available(&self, station_id: &str, code: u32) -> bool {
        let url = self.endpoints.parameter_station(code, station_id);
        match self.transport.get(&url) {
            Ok(response) => {
                debug!(station = station_id, code, status = response.status, "Parameter probe");
                response.is_success()
            }
            Err(e) => {
                debug!(station = station_id, code, error = %e, "Parameter probe failed");
                false
            }
        }
    }
}
