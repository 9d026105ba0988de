//! Front end state and the trigger surface
//!
//! [`WeatherStation`] owns the resolver context, the settings store and the
//! renderer, and exposes one method per user-triggered event. Every event
//! runs to completion before the next one is handled.

use std::fmt;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ForecastConfig;
use crate::data::{city_for_station, ParameterInfo, StationRecord, PRIMARY_PARAMETER};
use crate::render::{Renderer, SelectionView};
use crate::resolver::{CacheStats, ResolveError, ResolverContext, Selection, StationResolver};
use crate::settings::{SavedSelection, SettingsError, SettingsStore};
use crate::smhi::SmhiClient;
use crate::transport::Transport;

/// Errors returned by the trigger surface
#[derive(Debug, Error)]
pub enum AppError {
    /// Station index outside the station list
    #[error("station index {0} is out of range")]
    InvalidStation(usize),

    /// City resolution found no station with data
    #[error("no station with data found for \"{0}\"")]
    NoStationWithData(String),

    /// The operation needs a resolved station
    #[error("no station selected")]
    NoSelection,

    #[error("no saved selection")]
    NoSavedSelection,

    /// Every requested view failed to load
    #[error("no data available for {station}")]
    NoData { station: String },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to render output: {0}")]
    Render(#[from] std::io::Error),
}

/// One section of the forecast output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastView {
    Current,
    Hourly,
    Week,
    Daily,
    Observations,
}

impl ForecastView {
    /// Every view in display order
    pub const ALL: [ForecastView; 5] = [
        ForecastView::Current,
        ForecastView::Hourly,
        ForecastView::Week,
        ForecastView::Daily,
        ForecastView::Observations,
    ];
}

impl fmt::Display for ForecastView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForecastView::Current => "current",
            ForecastView::Hourly => "hourly",
            ForecastView::Week => "week",
            ForecastView::Daily => "daily",
            ForecastView::Observations => "observations",
        };
        f.write_str(name)
    }
}

/// The weather station front end
pub struct WeatherStation<T, S, R> {
    client: SmhiClient<T>,
    resolver: StationResolver,
    ctx: ResolverContext,
    settings: S,
    renderer: R,
    forecast: ForecastConfig,
    views: Vec<ForecastView>,
    /// Source of "today" (UTC) for the daily view
    today: fn() -> NaiveDate,
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

impl<T, S, R> WeatherStation<T, S, R>
where
    T: Transport,
    S: SettingsStore,
    R: Renderer,
{
    pub fn new(
        client: SmhiClient<T>,
        resolver: StationResolver,
        settings: S,
        renderer: R,
        forecast: ForecastConfig,
    ) -> Self {
        Self {
            client,
            resolver,
            ctx: ResolverContext::new(),
            settings,
            renderer,
            forecast,
            views: ForecastView::ALL.to_vec(),
            today: utc_today,
        }
    }

    /// Restrict which views `render_forecast` produces
    pub fn set_views(&mut self, views: Vec<ForecastView>) {
        self.views = views;
    }

    /// Override the UTC date used as "today"
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn selection(&self) -> &Selection {
        &self.ctx.selection
    }

    pub fn resolver(&self) -> &StationResolver {
        &self.resolver
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// Current cache sizes
    pub fn stats(&self) -> CacheStats {
        self.ctx.cache.stats()
    }

    fn station(&self, idx: usize) -> Result<&StationRecord, AppError> {
        self.resolver
            .stations()
            .get(idx)
            .ok_or(AppError::InvalidStation(idx))
    }

    /// Fetches and renders every enabled view for a station.
    ///
    /// Views that fail are rendered as unavailable; the call fails only if
    /// none of them could be shown.
    pub fn render_forecast(&mut self, station_idx: usize) -> Result<(), AppError> {
        let station = self.station(station_idx)?.clone();
        info!(station = %station.id, name = %station.name, "Rendering forecast");

        let mut rendered = 0;
        for view in self.views.clone() {
            if self.render_view(view, &station)? {
                rendered += 1;
            }
        }

        if rendered == 0 && !self.views.is_empty() {
            return Err(AppError::NoData {
                station: station.name,
            });
        }
        Ok(())
    }

    /// Renders one view; `Ok(false)` when its data could not be fetched.
    fn render_view(&mut self, view: ForecastView, station: &StationRecord) -> Result<bool, AppError> {
        let forecast = &self.forecast;
        let outcome = match view {
            ForecastView::Current => self
                .client
                .current(station)
                .map(|record| self.renderer.current(&record)),
            ForecastView::Hourly => self
                .client
                .hourly_forecast(station, forecast.hourly_limit)
                .map(|records| self.renderer.hourly(&records)),
            ForecastView::Week => self
                .client
                .week_forecast(station, forecast.week_days, forecast.noon_hour)
                .map(|records| self.renderer.week(&records)),
            ForecastView::Daily => self
                .client
                .daily(
                    station,
                    (self.today)(),
                    forecast.daily_days,
                    forecast.daily_sample_limit,
                )
                .map(|ranges| self.renderer.daily(&ranges)),
            ForecastView::Observations => {
                let parameter = self.selected_parameter();
                self.client
                    .observations(
                        &station.id,
                        parameter.code,
                        &forecast.observation_period,
                        forecast.observation_limit,
                    )
                    .map(|records| self.renderer.observations(parameter, &records))
            }
        };

        match outcome {
            Ok(written) => {
                written?;
                Ok(true)
            }
            Err(e) => {
                warn!(station = %station.id, view = %view, error = %e, "View unavailable");
                self.renderer.unavailable(view, &e.to_string())?;
                Ok(false)
            }
        }
    }

    fn selected_parameter(&self) -> &'static ParameterInfo {
        let catalog = self.resolver.catalog();
        catalog
            .by_code(self.ctx.selection.param_code)
            .or_else(|| catalog.by_code(PRIMARY_PARAMETER))
            .unwrap_or(&crate::data::parameters::PARAMETERS[0])
    }

    /// Renders the current selection, if any.
    pub fn render_selection(&mut self) -> Result<(), AppError> {
        let Some(idx) = self.ctx.selection.station_idx else {
            return Ok(());
        };
        let station = self.station(idx)?.clone();
        let catalog = *self.resolver.catalog();
        let view = SelectionView {
            city: &self.ctx.selection.city,
            station: &station,
            parameter: catalog.by_code(self.ctx.selection.param_code),
            available: self
                .ctx
                .selection
                .parameter_indices
                .iter()
                .filter_map(|&i| catalog.get(i))
                .collect(),
        };
        self.renderer.selection(&view)?;
        Ok(())
    }

    /// Resolves `city` to a station with data and renders its forecast.
    pub fn city_selection_changed(&mut self, city: &str) -> Result<(), AppError> {
        let city = city.trim();
        match self.resolver.resolve(&mut self.ctx, &self.client, city) {
            Ok(resolution) => {
                self.render_selection()?;
                self.render_forecast(resolution.station_idx)
            }
            Err(ResolveError::InvalidStation(idx)) => Err(AppError::InvalidStation(idx)),
            Err(e) => {
                warn!(city, error = %e, "City resolution failed");
                self.renderer.no_station(city)?;
                Err(AppError::NoStationWithData(city.to_string()))
            }
        }
    }

    /// Selects the parameter at `list_idx` of the station's available
    /// parameters and renders its observations.
    pub fn parameter_selection_changed(&mut self, list_idx: usize) -> Result<(), AppError> {
        let station_idx = self.ctx.selection.station_idx.ok_or(AppError::NoSelection)?;
        let station = self.station(station_idx)?.clone();

        let code = self
            .ctx
            .selection
            .param_code_for(self.resolver.catalog(), list_idx);
        self.ctx.selection.param_code = code;
        info!(station = %station.id, code, "Parameter selected");

        self.render_selection()?;
        if self.render_view(ForecastView::Observations, &station)? {
            Ok(())
        } else {
            Err(AppError::NoData {
                station: station.name,
            })
        }
    }

    /// Persists the current selection.
    pub fn save_defaults(&mut self) -> Result<(), AppError> {
        let station_idx = self.ctx.selection.station_idx.ok_or(AppError::NoSelection)?;
        let station_id = self.station(station_idx)?.id.clone();
        let selection = &self.ctx.selection;
        let saved = SavedSelection {
            station_id,
            param_code: selection.param_code,
            city_name: Some(selection.city.clone()).filter(|c| !c.is_empty()),
        };
        saved.save(&mut self.settings)?;
        info!(station = %saved.station_id, code = saved.param_code, "Defaults saved");
        Ok(())
    }

    /// Restores the saved selection and renders its forecast.
    pub fn reset_to_saved_defaults(&mut self) -> Result<(), AppError> {
        let saved = SavedSelection::load(&self.settings).ok_or(AppError::NoSavedSelection)?;
        let station_idx = self.apply_saved(&saved)?;
        self.render_selection()?;
        self.render_forecast(station_idx)
    }

    /// Restores the saved selection at startup without rendering.
    ///
    /// Does nothing when no selection was ever saved.
    pub fn restore_saved_selection(&mut self) -> Result<(), AppError> {
        match SavedSelection::load(&self.settings) {
            Some(saved) => self.apply_saved(&saved).map(|_| ()),
            None => {
                info!("No saved selection to restore");
                Ok(())
            }
        }
    }

    fn apply_saved(&mut self, saved: &SavedSelection) -> Result<usize, AppError> {
        let station_idx = match self.resolver.stations().index_of(&saved.station_id) {
            Some(idx) => idx,
            None => {
                warn!(station = %saved.station_id, "Saved station is not in the station list, using the first");
                0
            }
        };
        let station = self.station(station_idx)?;
        let city = saved
            .city_name
            .clone()
            .or_else(|| city_for_station(&station.name).map(str::to_string))
            .unwrap_or_else(|| station.name.clone());

        let indices = self
            .resolver
            .ensure_catalog(&mut self.ctx, &self.client, station_idx)
            .map_err(|_| AppError::InvalidStation(station_idx))?;

        let catalog = *self.resolver.catalog();
        let selection = &mut self.ctx.selection;
        selection.station_idx = Some(station_idx);
        selection.city = city;
        selection.parameter_indices = indices;
        let list_idx = selection.list_idx_for_code(&catalog, saved.param_code);
        selection.param_code = selection.param_code_for(&catalog, list_idx);

        info!(station = %saved.station_id, city = %selection.city, code = selection.param_code, "Selection restored");
        Ok(station_idx)
    }

    /// Empties the availability caches.
    pub fn clear_caches(&mut self) -> Result<(), AppError> {
        let stats = self.ctx.cache.stats();
        self.ctx.cache.clear();
        info!(available = stats.available, unavailable = stats.unavailable, "Caches cleared");
        Ok(())
    }

    /// Renders the availability cache sizes.
    pub fn cache_stats(&mut self) -> Result<(), AppError> {
        let stats = self.ctx.cache.stats();
        self.renderer.cache_stats(stats)?;
        Ok(())
    }
}
