//! Static reference data: stations, cities and city aliases
//!
//! The station list is loaded once (from the embedded reference file or a
//! user-supplied JSON file) and never mutated afterwards. A station's index
//! in the list is the handle used everywhere else.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use super::StationRecord;
use crate::fold::{contains_folded, fold};

/// Embedded SMHI station reference list
const BUILTIN_STATIONS: &str = include_str!("../../data/stations.json");

/// Errors that can occur while loading a station list
#[derive(Debug, Error)]
pub enum StationListError {
    /// Station file could not be read
    #[error("failed to read station list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Station file is not a JSON array of stations
    #[error("failed to parse station list: {0}")]
    Parse(#[from] serde_json::Error),

    /// The list contained no stations
    #[error("station list is empty")]
    Empty,
}

/// Immutable list of stations ordered by source index
#[derive(Debug, Clone)]
pub struct StationList {
    stations: Vec<StationRecord>,
    folded_names: Vec<String>,
}

impl StationList {
    /// Builds a list from records, keeping their order
    pub fn new(stations: Vec<StationRecord>) -> Self {
        let folded_names = stations.iter().map(|s| fold(&s.name)).collect();
        Self {
            stations,
            folded_names,
        }
    }

    /// Loads the embedded reference list
    pub fn builtin() -> Result<Self, StationListError> {
        Self::from_json(BUILTIN_STATIONS)
    }

    /// Parses a JSON array of `{id, name, latitude, longitude}` objects
    pub fn from_json(json: &str) -> Result<Self, StationListError> {
        let stations: Vec<StationRecord> = serde_json::from_str(json)?;
        if stations.is_empty() {
            return Err(StationListError::Empty);
        }
        Ok(Self::new(stations))
    }

    /// Loads a station list from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, StationListError> {
        let json = fs::read_to_string(path).map_err(|source| StationListError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Station at `idx`, or `None` when out of range
    pub fn get(&self, idx: usize) -> Option<&StationRecord> {
        self.stations.get(idx)
    }

    /// Folded display name of the station at `idx`
    pub fn folded_name(&self, idx: usize) -> Option<&str> {
        self.folded_names.get(idx).map(String::as_str)
    }

    /// Index of the station with identifier `id`
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.stations.iter().position(|s| s.id == id)
    }

    /// Iterate over `(index, station)` pairs in list order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &StationRecord)> {
        self.stations.iter().enumerate()
    }
}

/// Largest Swedish cities by population, in ASCII spelling
pub static TOP_CITIES: [&str; 99] = [
    "Stockholm", "Goteborg", "Malmo", "Uppsala", "Vasteras", "Orebro", "Linkoping",
    "Helsingborg", "Jonkoping", "Norrkoping", "Lund", "Umea", "Gavle", "Boras",
    "Sodertalje", "Eskilstuna", "Halmstad", "Vaxjo", "Karlstad", "Sundsvall", "Lulea",
    "Trollhattan", "Ostersund", "Borlange", "Kristianstad", "Kalmar", "Skovde",
    "Karlskrona", "Uddevalla", "Nykoping", "Falun", "Skelleftea", "Pitea", "Varberg",
    "Landskrona", "Motala", "Norrtalje", "Kungsbacka", "Varnamo", "Angelholm", "Eslov",
    "Visby", "Lerum", "Alingsas", "Sandviken", "Kungalv", "Katrineholm", "Hassleholm",
    "Vetlanda", "Ystad", "Enkoping", "Hudiksvall", "Lidkoping", "Mora", "Kristinehamn",
    "Trelleborg", "Harnosand", "Nassjo", "Saffle", "Mariestad", "Nykvarn", "Huskvarna",
    "Vanersborg", "Vallentuna", "Sollentuna", "Taby", "Solna", "Sundbyberg", "Danderyd",
    "Jarfalla", "Upplands Vasby", "Haninge", "Tyreso", "Nynashamn", "Tumba", "Nacka",
    "Lidingo", "Sigtuna", "Akalla", "Kista", "Bromma", "Hagersten", "Skogas", "Boden",
    "Kiruna", "Gislaved", "Hedemora", "Arvika", "Oskarshamn", "Bastad", "Avesta",
    "Koping", "Staffanstorp", "Hoganas", "Partille", "Habo", "Eda", "Upplands-Bro",
    "Sigtuna Kommun",
];

/// Cities whose folded name contains `query`; an empty query matches all.
pub fn filter_cities(query: &str) -> Vec<&'static str> {
    let query = query.trim();
    TOP_CITIES
        .iter()
        .copied()
        .filter(|city| query.is_empty() || contains_folded(city, query))
        .collect()
}

/// Finds the city a station belongs to.
///
/// Tries an exact folded match first, then a city that prefixes the
/// station name, then a city contained anywhere in it.
pub fn city_for_station(station_name: &str) -> Option<&'static str> {
    let folded_station = fold(station_name);
    let folded_cities: Vec<(&'static str, String)> =
        TOP_CITIES.iter().map(|&c| (c, fold(c))).collect();

    let exact = folded_cities.iter().find(|(_, f)| *f == folded_station);
    let prefix = || folded_cities.iter().find(|(_, f)| folded_station.starts_with(f.as_str()));
    let anywhere = || folded_cities.iter().find(|(_, f)| folded_station.contains(f.as_str()));

    exact.or_else(prefix).or_else(anywhere).map(|(c, _)| *c)
}

/// City name aliases: folded canonical key to native-spelling synonyms
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: HashMap<String, Vec<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AliasTable {
    /// Alias table with no entries
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Built-in aliases for Swedish cities whose names carry diacritics
    pub fn builtin() -> Self {
        const ALIASES: &[(&str, &[&str])] = &[
            ("gothenburg", &["Goteborg", "Göteborg"]),
            ("goteborg", &["Goteborg", "Göteborg"]),
            ("malmo", &["Malmo", "Malmö"]),
            ("vasteras", &["Vasteras", "Västerås"]),
            ("orebro", &["Orebro", "Örebro"]),
            ("gavle", &["Gavle", "Gävle"]),
            ("jonkoping", &["Jonkoping", "Jönköping"]),
            ("norrkoping", &["Norrkoping", "Norrköping"]),
            ("angelholm", &["Angelholm", "Ängelholm"]),
            ("ostersund", &["Ostersund", "Östersund"]),
            ("harnosand", &["Harnosand", "Härnösand"]),
            ("hassleholm", &["Hassleholm", "Hässleholm"]),
            ("nynashamn", &["Nynashamn", "Nynäshamn"]),
            ("vaxjo", &["Vaxjo", "Växjö"]),
            ("taby", &["Taby", "Täby"]),
            ("sodertalje", &["Sodertalje", "Södertälje"]),
            ("umea", &["Umea", "Umeå"]),
            ("skelleftea", &["Skelleftea", "Skellefteå"]),
            ("pitea", &["Pitea", "Piteå"]),
            ("lulea", &["Lulea", "Luleå"]),
            ("borlange", &["Borlange", "Borlänge"]),
            ("alvsjo", &["Alvsjo", "Älvsjö"]),
            ("vanersborg", &["Vanersborg", "Vänersborg"]),
            ("nassjo", &["Nassjo", "Nässjö"]),
            ("hoganas", &["Hoganas", "Höganäs"]),
            ("varmdo", &["Varmdo", "Värmdö"]),
            ("karlskrona", &["Karlskrona"]),
            ("akalla", &["Akalla", "Stockholm"]),
            ("kista", &["Kista", "Stockholm"]),
            ("hagersten", &["Hagersten", "Hägersten", "Stockholm"]),
            ("skogas", &["Skogas", "Skogås", "Haninge"]),
            ("upplands-bro", &["Upplands-Bro", "Kungsängen", "Upplands Väsby"]),
            ("sigtuna kommun", &["Sigtuna", "Stockholm-Arlanda"]),
        ];

        let mut table = Self::empty();
        for (key, synonyms) in ALIASES {
            table.insert(key, synonyms.iter().map(|s| s.to_string()).collect());
        }
        table
    }

    /// Adds or replaces the synonyms for `key` (folded before storing)
    pub fn insert(&mut self, key: &str, synonyms: Vec<String>) {
        self.entries.insert(fold(key), synonyms);
    }

    /// Search terms for a city: its alias synonyms followed by the input
    pub fn search_terms(&self, city: &str) -> Vec<String> {
        let mut terms = self.entries.get(&fold(city)).cloned().unwrap_or_default();
        terms.push(city.to_string());
        terms
    }
}
