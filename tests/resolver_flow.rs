//! End-to-end tests of city resolution, fetching and saved selections
//!
//! The network is replaced by a scripted transport that counts requests
//! per URL, and output goes to a renderer that records what it was given.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::time::Duration;

use chrono::NaiveDate;

use smhiwx::app::{AppError, ForecastView, WeatherStation};
use smhiwx::cli::{execute, CliError, Command, ViewArg};
use smhiwx::config::ForecastConfig;
use smhiwx::data::{
    AliasTable, DayRange, ParameterCatalog, ParameterInfo, StationList, WeatherRecord,
};
use smhiwx::extract::TimeSeriesExtractor;
use smhiwx::render::{Renderer, SelectionView};
use smhiwx::resolver::{CacheStats, StationResolver};
use smhiwx::settings::{MemoryStore, SavedSelection};
use smhiwx::smhi::{Endpoints, SmhiClient, DEFAULT_PROBE_PERIOD};
use smhiwx::stream::{Pacing, SliceSource};
use smhiwx::transport::{HttpResponse, Transport, TransportError};

const GOTEBORG_A: &str = "71420";
const GOTEBORG_SAVE: &str = "72420";

/// Transport answering from a URL table; unknown URLs get 404
#[derive(Default)]
struct FakeTransport {
    routes: HashMap<String, (u16, String)>,
    calls: RefCell<HashMap<String, usize>>,
}

impl FakeTransport {
    fn route(&mut self, url: String, status: u16, body: impl Into<String>) {
        self.routes.insert(url, (status, body.into()));
    }

    fn calls(&self, url: &str) -> usize {
        self.calls.borrow().get(url).copied().unwrap_or(0)
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        *self.calls.borrow_mut().entry(url.to_string()).or_default() += 1;
        let (status, body) = self
            .routes
            .get(url)
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(HttpResponse {
            status,
            body: Box::new(SliceSource::new(body)),
        })
    }
}

/// Renderer that records one line per call
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Renderer for Recorder {
    fn selection(&mut self, view: &SelectionView<'_>) -> io::Result<()> {
        self.events
            .push(format!("selection:{}:{}", view.city, view.station.id));
        Ok(())
    }

    fn current(&mut self, record: &WeatherRecord) -> io::Result<()> {
        self.events.push(format!("current:{}", record.value));
        Ok(())
    }

    fn hourly(&mut self, records: &[WeatherRecord]) -> io::Result<()> {
        self.events.push(format!("hourly:{}", records.len()));
        Ok(())
    }

    fn week(&mut self, records: &[WeatherRecord]) -> io::Result<()> {
        self.events.push(format!("week:{}", records.len()));
        Ok(())
    }

    fn daily(&mut self, ranges: &[DayRange]) -> io::Result<()> {
        self.events.push(format!("daily:{}", ranges.len()));
        Ok(())
    }

    fn observations(&mut self, parameter: &ParameterInfo, records: &[WeatherRecord]) -> io::Result<()> {
        self.events
            .push(format!("observations:{}:{}", parameter.code, records.len()));
        Ok(())
    }

    fn unavailable(&mut self, view: ForecastView, _reason: &str) -> io::Result<()> {
        self.events.push(format!("unavailable:{}", view));
        Ok(())
    }

    fn no_station(&mut self, city: &str) -> io::Result<()> {
        self.events.push(format!("no_station:{}", city));
        Ok(())
    }

    fn cache_stats(&mut self, stats: CacheStats) -> io::Result<()> {
        self.events
            .push(format!("cache_stats:{}:{}", stats.available, stats.unavailable));
        Ok(())
    }
}

fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
}

fn forecast_body() -> String {
    let mut entries = Vec::new();
    for day in 15..=18 {
        for hour in [0, 6, 12, 18] {
            entries.push(format!(
                r#"{{"validTime":"2024-07-{day}T{hour:02}:00:00Z","parameters":[{{"name":"msl","values":[1012]}},{{"name":"t","values":[{}]}},{{"name":"Wsymb2","values":[{}]}}]}}"#,
                day + hour,
                (hour / 6) + 1
            ));
        }
    }
    format!(
        r#"{{"approvedTime":"2024-07-15T00:00:00Z","geometry":{{"type":"Point"}},"timeSeries":[{}]}}"#,
        entries.join(",")
    )
}

fn observation_body() -> &'static str {
    r#"{"station":{"key":"72420"},"value":[{"date":1721044800000,"value":"18.7","quality":"G"},{"date":1721048400000,"value":"19.1","quality":"G"}]}"#
}

fn primary_url(station_id: &str) -> String {
    Endpoints::default().observation_data(1, station_id, DEFAULT_PROBE_PERIOD)
}

/// Göteborg A has no data; Göteborg-Säve reports temperature, wind speed
/// and humidity.
fn goteborg_transport(stations: &StationList) -> FakeTransport {
    let endpoints = Endpoints::default();
    let save = stations
        .get(stations.index_of(GOTEBORG_SAVE).unwrap())
        .unwrap();

    let mut fake = FakeTransport::default();
    fake.route(primary_url(GOTEBORG_SAVE), 200, observation_body());
    fake.route(endpoints.parameter_station(4, GOTEBORG_SAVE), 200, "{}");
    fake.route(endpoints.parameter_station(6, GOTEBORG_SAVE), 200, "{}");
    fake.route(
        endpoints.point_forecast(save.latitude, save.longitude),
        200,
        forecast_body(),
    );
    for code in [1, 4] {
        fake.route(
            endpoints.observation_data(code, GOTEBORG_SAVE, "latest-day"),
            200,
            observation_body(),
        );
    }
    fake
}

fn front_end<'a>(
    transport: &'a FakeTransport,
    settings: MemoryStore,
) -> WeatherStation<&'a FakeTransport, MemoryStore, Recorder> {
    let pacing = Pacing::new(Duration::from_millis(100), Duration::from_millis(1));
    let client = SmhiClient::new(transport)
        .with_extractor(TimeSeriesExtractor::new(pacing, 2048))
        .with_first_byte_timeout(Duration::from_millis(20));
    let resolver = StationResolver::new(
        StationList::builtin().unwrap(),
        AliasTable::builtin(),
        ParameterCatalog::new(),
    );
    WeatherStation::new(
        client,
        resolver,
        settings,
        Recorder::default(),
        ForecastConfig::default(),
    )
    .with_today(fixed_today)
}

#[test]
fn test_gothenburg_alias_resolves_native_station() {
    let stations = StationList::builtin().unwrap();
    let fake = goteborg_transport(&stations);
    let mut station = front_end(&fake, MemoryStore::new());

    // Göteborg A, Göteborg-Säve, Göteborg-Landvetter Flygplats
    let expected: Vec<usize> = ["71420", "72420", "71380"]
        .iter()
        .map(|id| stations.index_of(id).unwrap())
        .collect();
    assert_eq!(station.resolver().candidates("Gothenburg"), expected);

    station.city_selection_changed("Gothenburg").unwrap();

    let selection = station.selection();
    assert_eq!(selection.station_idx, stations.index_of(GOTEBORG_SAVE));
    assert_eq!(selection.city, "Gothenburg");
    assert_eq!(selection.parameter_indices, vec![0, 3, 5]);
    assert_eq!(fake.calls(&primary_url(GOTEBORG_A)), 1);

    assert_eq!(
        station.renderer().events,
        vec![
            "selection:Gothenburg:72420",
            "current:15",
            "hourly:16",
            "week:4",
            "daily:3",
            "observations:1:2",
        ]
    );
}

#[test]
fn test_negative_cache_prevents_reprobe() {
    let stations = StationList::builtin().unwrap();
    let fake = goteborg_transport(&stations);
    let mut station = front_end(&fake, MemoryStore::new());

    station.city_selection_changed("Göteborg").unwrap();
    station.city_selection_changed("goteborg").unwrap();

    assert_eq!(fake.calls(&primary_url(GOTEBORG_A)), 1);
    assert_eq!(fake.calls(&primary_url(GOTEBORG_SAVE)), 1);
    assert_eq!(
        station.stats(),
        CacheStats {
            available: 1,
            unavailable: 1
        }
    );

    // Clearing the caches makes both stations eligible for probing again
    station.clear_caches().unwrap();
    station.city_selection_changed("Goteborg").unwrap();
    assert_eq!(fake.calls(&primary_url(GOTEBORG_A)), 2);
    assert_eq!(fake.calls(&primary_url(GOTEBORG_SAVE)), 2);
}

#[test]
fn test_unresolvable_city_reports_no_station() {
    let fake = FakeTransport::default();
    let mut station = front_end(&fake, MemoryStore::new());

    let err = station.city_selection_changed("Malmö").unwrap_err();
    assert!(matches!(err, AppError::NoStationWithData(_)));
    assert_eq!(station.renderer().events, vec!["no_station:Malmö"]);
    assert_eq!(station.stats().unavailable, 2);
    assert_eq!(station.selection().station_idx, None);
}

#[test]
fn test_save_and_reset_round_trip() {
    let stations = StationList::builtin().unwrap();
    let fake = goteborg_transport(&stations);
    let mut station = front_end(&fake, MemoryStore::new());

    station.city_selection_changed("Gothenburg").unwrap();
    station.parameter_selection_changed(1).unwrap();
    assert_eq!(station.selection().param_code, 4);
    station.save_defaults().unwrap();

    let saved = SavedSelection::load(station.settings()).unwrap();
    assert_eq!(
        saved,
        SavedSelection {
            station_id: GOTEBORG_SAVE.to_string(),
            param_code: 4,
            city_name: Some("Gothenburg".to_string()),
        }
    );

    // A fresh front end over the same settings restores the selection
    let mut restarted = front_end(&fake, station.settings().clone());
    restarted.reset_to_saved_defaults().unwrap();
    let selection = restarted.selection();
    assert_eq!(selection.station_idx, stations.index_of(GOTEBORG_SAVE));
    assert_eq!(selection.param_code, 4);
    assert_eq!(selection.city, "Gothenburg");
    assert!(restarted
        .renderer()
        .events
        .contains(&"observations:4:2".to_string()));
}

#[test]
fn test_restore_derives_missing_city_name() {
    let stations = StationList::builtin().unwrap();
    let fake = goteborg_transport(&stations);
    let mut settings = MemoryStore::new();
    SavedSelection {
        station_id: GOTEBORG_SAVE.to_string(),
        param_code: 39,
        city_name: None,
    }
    .save(&mut settings)
    .unwrap();

    let mut station = front_end(&fake, settings);
    station.restore_saved_selection().unwrap();

    let selection = station.selection();
    assert_eq!(selection.city, "Goteborg");
    // Dew point is not reported there, so the first available parameter wins
    assert_eq!(selection.param_code, 1);
    assert!(station.renderer().events.is_empty());
}

#[test]
fn test_cli_commands_against_saved_selection() {
    let stations = StationList::builtin().unwrap();
    let fake = goteborg_transport(&stations);
    let mut settings = MemoryStore::new();
    SavedSelection {
        station_id: GOTEBORG_SAVE.to_string(),
        param_code: 1,
        city_name: Some("Goteborg".to_string()),
    }
    .save(&mut settings)
    .unwrap();
    let mut station = front_end(&fake, settings);

    assert!(matches!(
        execute(&mut station, &Command::Param { code: 39, save: false }),
        Err(CliError::ParameterUnavailable { code: 39, .. })
    ));
    assert!(matches!(
        execute(&mut station, &Command::Param { code: 15, save: false }),
        Err(CliError::UnknownParameter(15))
    ));

    execute(&mut station, &Command::Forecast { view: ViewArg::Week }).unwrap();
    assert_eq!(
        station.renderer().events,
        vec!["selection:Goteborg:72420", "week:4"]
    );
}

#[test]
fn test_cli_forecast_without_saved_selection() {
    let fake = FakeTransport::default();
    let mut station = front_end(&fake, MemoryStore::new());
    assert!(matches!(
        execute(&mut station, &Command::Forecast { view: ViewArg::All }),
        Err(CliError::App(AppError::NoSavedSelection))
    ));
}
