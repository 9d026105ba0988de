//! Command-line interface for smhiwx
//!
//! This module parses arguments with clap and drives the
//! [`WeatherStation`] trigger surface. Each invocation handles one command;
//! state that must outlive the process goes through the saved selection.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tokio::runtime::Handle;

use crate::app::{AppError, ForecastView, WeatherStation};
use crate::config::{Config, ConfigError};
use crate::data::{filter_cities, AliasTable, ParameterCatalog, StationList, StationListError};
use crate::extract::TimeSeriesExtractor;
use crate::render::{Renderer, TerminalRenderer};
use crate::resolver::StationResolver;
use crate::settings::{JsonFileStore, SettingsError, SettingsStore};
use crate::smhi::{Endpoints, SmhiClient};
use crate::transport::{HttpTransport, Transport, TransportError};

/// Error types for the command line front end
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stations(#[from] StationListError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    App(#[from] AppError),

    /// The parameter code is not in the catalog
    #[error("Unknown parameter code: {0}")]
    UnknownParameter(u32),

    /// The selected station does not report the parameter
    #[error("Parameter {code} is not available at {station}")]
    ParameterUnavailable { code: u32, station: String },

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// SMHI weather for Swedish cities
#[derive(Parser, Debug)]
#[command(name = "smhiwx")]
#[command(about = "Weather forecasts and observations for Swedish cities from SMHI open data")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Station list (JSON) to use instead of the built-in one
    #[arg(long, global = true, value_name = "FILE")]
    pub stations: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the known cities
    Cities {
        /// Only cities containing this text (diacritics ignored)
        #[arg(long)]
        filter: Option<String>,
    },

    /// Find a station with data for a city and show its forecast
    Select {
        city: String,

        /// Save the selection as the default
        #[arg(long)]
        save: bool,
    },

    /// Show observations of a parameter at the saved station
    Param {
        /// SMHI parameter code (e.g. 4 for wind speed)
        code: u32,

        /// Save the parameter with the default selection
        #[arg(long)]
        save: bool,
    },

    /// Show the forecast for the saved selection
    Forecast {
        #[arg(long, value_enum, default_value_t = ViewArg::All)]
        view: ViewArg,
    },

    /// Reload the saved selection and show its forecast
    Reset,
}

/// Which forecast views to show
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewArg {
    Current,
    Hourly,
    Week,
    Daily,
    Observations,
    All,
}

impl ViewArg {
    pub fn views(self) -> Vec<ForecastView> {
        match self {
            ViewArg::Current => vec![ForecastView::Current],
            ViewArg::Hourly => vec![ForecastView::Hourly],
            ViewArg::Week => vec![ForecastView::Week],
            ViewArg::Daily => vec![ForecastView::Daily],
            ViewArg::Observations => vec![ForecastView::Observations],
            ViewArg::All => ForecastView::ALL.to_vec(),
        }
    }
}

/// Default log filter for a `-v` count; `RUST_LOG` takes precedence.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "smhiwx=warn",
        1 => "smhiwx=info",
        _ => "smhiwx=debug",
    }
}

/// Writes the cities matching `filter`, one per line
pub fn print_cities<W: Write>(mut out: W, filter: Option<&str>) -> io::Result<()> {
    for city in filter_cities(filter.unwrap_or("")) {
        writeln!(out, "{}", city)?;
    }
    Ok(())
}

/// Builds the front end from configuration and runs one command.
///
/// Blocks on network IO; must run outside the async runtime's worker
/// threads (e.g. in `spawn_blocking`).
pub fn run(cli: &Cli, runtime: Handle) -> Result<(), CliError> {
    if let Command::Cities { filter } = &cli.command {
        return Ok(print_cities(io::stdout().lock(), filter.as_deref())?);
    }

    let config = Config::load(cli.config.as_deref())?;
    let stations = match cli.stations.as_ref().or(config.stations_file.as_ref()) {
        Some(path) => StationList::from_file(path)?,
        None => StationList::builtin()?,
    };

    let transport = HttpTransport::new(
        runtime,
        config.api.request_timeout(),
        config.api.connect_timeout(),
    )?;
    let client = SmhiClient::new(transport)
        .with_endpoints(Endpoints::new(
            config.api.observations_url.as_str(),
            config.api.forecast_url.as_str(),
        ))
        .with_extractor(TimeSeriesExtractor::new(
            config.stream.pacing(),
            config.stream.object_buffer_bytes,
        ))
        .with_probe_period(config.api.probe_period.as_str())
        .with_first_byte_timeout(config.api.first_byte_timeout());

    let resolver = StationResolver::new(stations, AliasTable::builtin(), ParameterCatalog::new());
    let settings = JsonFileStore::open_default()?;
    let mut station = WeatherStation::new(
        client,
        resolver,
        settings,
        TerminalRenderer::stdout(),
        config.forecast.clone(),
    );
    execute(&mut station, &cli.command)
}

/// Runs one command against a front end
pub fn execute<T, S, R>(station: &mut WeatherStation<T, S, R>, command: &Command) -> Result<(), CliError>
where
    T: Transport,
    S: SettingsStore,
    R: Renderer,
{
    match command {
        Command::Cities { filter } => print_cities(io::stdout().lock(), filter.as_deref())?,
        Command::Select { city, save } => {
            station.city_selection_changed(city)?;
            if *save {
                station.save_defaults()?;
            }
        }
        Command::Param { code, save } => {
            restore(station)?;
            let list_idx = available_list_idx(station, *code)?;
            station.parameter_selection_changed(list_idx)?;
            if *save {
                station.save_defaults()?;
            }
        }
        Command::Forecast { view } => {
            let station_idx = restore(station)?;
            station.set_views(view.views());
            station.render_selection()?;
            station.render_forecast(station_idx)?;
        }
        Command::Reset => station.reset_to_saved_defaults()?,
    }
    Ok(())
}

/// Restores the saved selection, failing when there is none
fn restore<T, S, R>(station: &mut WeatherStation<T, S, R>) -> Result<usize, CliError>
where
    T: Transport,
    S: SettingsStore,
    R: Renderer,
{
    station.restore_saved_selection()?;
    Ok(station
        .selection()
        .station_idx
        .ok_or(AppError::NoSavedSelection)?)
}

/// Position of `code` among the selected station's parameters
fn available_list_idx<T, S, R>(station: &WeatherStation<T, S, R>, code: u32) -> Result<usize, CliError>
where
    T: Transport,
    S: SettingsStore,
    R: Renderer,
{
    let catalog = station.resolver().catalog();
    let catalog_idx = catalog.index_of(code).ok_or(CliError::UnknownParameter(code))?;
    let selection = station.selection();
    selection
        .parameter_indices
        .iter()
        .position(|&idx| idx == catalog_idx)
        .ok_or_else(|| CliError::ParameterUnavailable {
            code,
            station: selection
                .station_idx
                .and_then(|idx| station.resolver().stations().get(idx))
                .map(|s| s.name.clone())
                .unwrap_or_default(),
        })
}
