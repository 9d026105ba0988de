//! City to station resolution
//!
//! A free-text city name is folded and matched against every station name
//! (with alias synonyms), candidates are ranked, and each is probed in turn
//! until one proves it has data. The first such station becomes the
//! selection and its parameter catalog is cached.
//!
//! All mutable state (caches and the current selection) lives in a
//! [`ResolverContext`] owned by the caller.

pub mod cache;

pub use cache::{AvailabilityCache, CacheStats, StationAvailability};

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::{AliasTable, ParameterCatalog, StationList, StationRecord, PRIMARY_PARAMETER};
use crate::fold::fold;
use crate::smhi::FetchError;

/// Data availability checks for a station
pub trait StationProbe {
    /// Checks that the station has primary-parameter data.
    fn probe_primary(&self, station_id: &str) -> Result<(), FetchError>;

    /// Whether the station reports parameter `code`.
    fn parameter_available(&self, station_id: &str, code: u32) -> bool;
}

impl<P: StationProbe + ?Sized> StationProbe for &P {
    fn probe_primary(&self, station_id: &str) -> Result<(), FetchError> {
        (**self).probe_primary(station_id)
    }

    fn parameter_available(&self, station_id: &str, code: u32) -> bool {
        (**self).parameter_available(station_id, code)
    }
}

/// Errors that can occur when resolving a city
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No station name matched the city
    #[error("no station matches \"{0}\"")]
    NoCandidates(String),

    /// Every candidate was probed without finding data
    #[error("none of {tried} candidate stations for \"{city}\" has data")]
    Exhausted { city: String, tried: usize },

    /// Station index outside the station list
    #[error("station index {0} is out of range")]
    InvalidStation(usize),
}

/// Resolution progress, logged as each state is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    NoCandidate,
    ProbingPrimary,
    FetchingCatalog,
    Resolved,
}

impl fmt::Display for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolveState::NoCandidate => "no-candidate",
            ResolveState::ProbingPrimary => "probing-primary",
            ResolveState::FetchingCatalog => "fetching-catalog",
            ResolveState::Resolved => "resolved",
        };
        f.write_str(name)
    }
}

/// The current station, parameter and city
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub station_idx: Option<usize>,
    pub param_code: u32,
    pub city: String,
    /// Catalog indices available at the selected station, ascending
    pub parameter_indices: Vec<usize>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            station_idx: None,
            param_code: PRIMARY_PARAMETER,
            city: String::new(),
            parameter_indices: Vec::new(),
        }
    }
}

impl Selection {
    /// Parameter code at position `list_idx` of the available parameters.
    ///
    /// Out-of-range positions fall back to the primary parameter.
    pub fn param_code_for(&self, catalog: &ParameterCatalog, list_idx: usize) -> u32 {
        self.parameter_indices
            .get(list_idx)
            .and_then(|&idx| catalog.get(idx))
            .map(|info| info.code)
            .unwrap_or(PRIMARY_PARAMETER)
    }

    /// Position of parameter `code` in the available parameters, or 0
    pub fn list_idx_for_code(&self, catalog: &ParameterCatalog, code: u32) -> usize {
        catalog
            .index_of(code)
            .and_then(|idx| self.parameter_indices.iter().position(|&i| i == idx))
            .unwrap_or(0)
    }
}

/// Caches and selection state for one front end
#[derive(Debug, Clone, Default)]
pub struct ResolverContext {
    pub cache: AvailabilityCache,
    pub selection: Selection,
}

impl ResolverContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub station_idx: usize,
    pub parameter_indices: Vec<usize>,
}

/// Resolves city names to stations with data
#[derive(Debug, Clone)]
pub struct StationResolver {
    stations: StationList,
    aliases: AliasTable,
    catalog: ParameterCatalog,
}

impl StationResolver {
    pub fn new(stations: StationList, aliases: AliasTable, catalog: ParameterCatalog) -> Self {
        Self {
            stations,
            aliases,
            catalog,
        }
    }

    pub fn stations(&self) -> &StationList {
        &self.stations
    }

    pub fn catalog(&self) -> &ParameterCatalog {
        &self.catalog
    }

    /// Station at `idx`, or [`ResolveError::InvalidStation`]
    pub fn station(&self, idx: usize) -> Result<&StationRecord, ResolveError> {
        self.stations.get(idx).ok_or(ResolveError::InvalidStation(idx))
    }

    /// Ranked candidate station indices for `city`.
    ///
    /// A station matches when any search term is a substring of its folded
    /// name. Prefix matches rank before matches elsewhere, then shorter
    /// names first; ties keep list order.
    pub fn candidates(&self, city: &str) -> Vec<usize> {
        let mut terms: Vec<String> = Vec::new();
        for term in self.aliases.search_terms(city) {
            let folded = fold(term.trim());
            if !folded.is_empty() && !terms.contains(&folded) {
                terms.push(folded);
            }
        }

        let mut ranked: Vec<(u8, usize, usize)> = Vec::new();
        for (idx, _) in self.stations.iter() {
            let Some(name) = self.stations.folded_name(idx) else {
                continue;
            };
            let rank = if terms.iter().any(|t| name.starts_with(t.as_str())) {
                0
            } else if terms.iter().any(|t| name.contains(t.as_str())) {
                1
            } else {
                continue;
            };
            ranked.push((rank, name.len(), idx));
        }

        ranked.sort_by_key(|&(rank, len, _)| (rank, len));
        ranked.into_iter().map(|(_, _, idx)| idx).collect()
    }

    /// Resolves `city` to the first candidate station that has data.
    ///
    /// On success the selection in `ctx` is updated; on failure it is left
    /// untouched. Failed primary probes are remembered in the negative
    /// cache and those stations are skipped on later attempts.
    pub fn resolve<P>(
        &self,
        ctx: &mut ResolverContext,
        probe: &P,
        city: &str,
    ) -> Result<Resolution, ResolveError>
    where
        P: StationProbe + ?Sized,
    {
        info!(city, state = %ResolveState::NoCandidate, "Resolving city");
        let candidates = self.candidates(city);
        if candidates.is_empty() {
            warn!(city, "No station matches city");
            return Err(ResolveError::NoCandidates(city.to_string()));
        }
        debug!(city, count = candidates.len(), "Candidates ranked");

        for &idx in &candidates {
            let station = self.station(idx)?;
            let id = station.id.as_str();

            if ctx.cache.is_unavailable(id) {
                debug!(station = id, "Skipping station without data (cached)");
                continue;
            }

            let indices = match ctx.cache.get(id) {
                Some(cached) => {
                    debug!(station = id, "Availability cache hit");
                    cached.parameter_indices.clone()
                }
                None => match self.discover(ctx, probe, id) {
                    Some(indices) => indices,
                    None => continue,
                },
            };

            if indices.is_empty() {
                continue;
            }

            info!(city, station = id, name = %station.name, state = %ResolveState::Resolved, "City resolved");
            self.select(ctx, city, idx, &indices);
            return Ok(Resolution {
                station_idx: idx,
                parameter_indices: indices,
            });
        }

        warn!(city, tried = candidates.len(), "No candidate station has data");
        Err(ResolveError::Exhausted {
            city: city.to_string(),
            tried: candidates.len(),
        })
    }

    /// Returns the parameter catalog of a station, probing it if unknown.
    ///
    /// Stations in the negative cache, or whose primary probe fails, yield
    /// an empty catalog.
    pub fn ensure_catalog<P>(
        &self,
        ctx: &mut ResolverContext,
        probe: &P,
        station_idx: usize,
    ) -> Result<Vec<usize>, ResolveError>
    where
        P: StationProbe + ?Sized,
    {
        let id = self.station(station_idx)?.id.as_str();
        if let Some(cached) = ctx.cache.get(id) {
            debug!(station = id, "Availability cache hit");
            return Ok(cached.parameter_indices.clone());
        }
        if ctx.cache.is_unavailable(id) {
            debug!(station = id, "Station has no data (cached)");
            return Ok(Vec::new());
        }
        Ok(self.discover(ctx, probe, id).unwrap_or_default())
    }

    /// Primary probe followed by the catalog fetch; caches the outcome.
    fn discover<P>(&self, ctx: &mut ResolverContext, probe: &P, id: &str) -> Option<Vec<usize>>
    where
        P: StationProbe + ?Sized,
    {
        info!(station = id, state = %ResolveState::ProbingPrimary, "Probing station");
        if let Err(e) = probe.probe_primary(id) {
            warn!(station = id, error = %e, "Primary probe failed");
            ctx.cache.mark_unavailable(id);
            return None;
        }

        info!(station = id, state = %ResolveState::FetchingCatalog, "Fetching parameter catalog");
        let mut indices: Vec<usize> = self
            .catalog
            .index_of(PRIMARY_PARAMETER)
            .into_iter()
            .collect();
        for idx in self.catalog.probe_order() {
            let Some(info) = self.catalog.get(idx) else {
                continue;
            };
            if probe.parameter_available(id, info.code) {
                indices.push(idx);
            }
        }

        ctx.cache.insert(
            id,
            StationAvailability {
                has_primary: true,
                parameter_indices: indices,
            },
        );
        let indices = ctx
            .cache
            .get(id)
            .map(|a| a.parameter_indices.clone())
            .unwrap_or_default();
        debug!(station = id, parameters = indices.len(), "Catalog cached");
        Some(indices)
    }

    /// Keeps the selected parameter if the station reports it, else falls
    /// back to the station's first parameter.
    fn select(&self, ctx: &mut ResolverContext, city: &str, station_idx: usize, indices: &[usize]) {
        let selection = &mut ctx.selection;
        let keep_param = self
            .catalog
            .index_of(selection.param_code)
            .map(|idx| indices.contains(&idx))
            .unwrap_or(false);
        if !keep_param {
            selection.param_code = indices
                .first()
                .and_then(|&idx| self.catalog.get(idx))
                .map(|info| info.code)
                .unwrap_or(PRIMARY_PARAMETER);
        }
        selection.station_idx = Some(station_idx);
        selection.city = city.to_string();
        selection.parameter_indices = indices.to_vec();
    }
}
