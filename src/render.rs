//! Rendering of weather records
//!
//! The front end hands finished records to a [`Renderer`]. The shipped
//! [`TerminalRenderer`] writes plain text lines; all times are UTC.

use std::io::{self, Write};

use crate::app::ForecastView;
use crate::data::{Condition, DayRange, ParameterInfo, StationRecord, WeatherRecord};
use crate::resolver::CacheStats;

/// The resolved selection as shown to the user
#[derive(Debug, Clone)]
pub struct SelectionView<'a> {
    pub city: &'a str,
    pub station: &'a StationRecord,
    /// Currently selected parameter
    pub parameter: Option<&'static ParameterInfo>,
    /// Parameters the station reports, in catalog order
    pub available: Vec<&'static ParameterInfo>,
}

/// Consumes records produced by the front end
pub trait Renderer {
    fn selection(&mut self, view: &SelectionView<'_>) -> io::Result<()>;
    fn current(&mut self, record: &WeatherRecord) -> io::Result<()>;
    fn hourly(&mut self, records: &[WeatherRecord]) -> io::Result<()>;
    fn week(&mut self, records: &[WeatherRecord]) -> io::Result<()>;
    fn daily(&mut self, ranges: &[DayRange]) -> io::Result<()>;
    fn observations(&mut self, parameter: &ParameterInfo, records: &[WeatherRecord]) -> io::Result<()>;

    /// A view could not be fetched
    fn unavailable(&mut self, view: ForecastView, reason: &str) -> io::Result<()>;

    /// No station with data was found for `city`
    fn no_station(&mut self, city: &str) -> io::Result<()>;

    fn cache_stats(&mut self, stats: CacheStats) -> io::Result<()>;
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn selection(&mut self, view: &SelectionView<'_>) -> io::Result<()> {
        (**self).selection(view)
    }

    fn current(&mut self, record: &WeatherRecord) -> io::Result<()> {
        (**self).current(record)
    }

    fn hourly(&mut self, records: &[WeatherRecord]) -> io::Result<()> {
        (**self).hourly(records)
    }

    fn week(&mut self, records: &[WeatherRecord]) -> io::Result<()> {
        (**self).week(records)
    }

    fn daily(&mut self, ranges: &[DayRange]) -> io::Result<()> {
        (**self).daily(ranges)
    }

    fn observations(&mut self, parameter: &ParameterInfo, records: &[WeatherRecord]) -> io::Result<()> {
        (**self).observations(parameter, records)
    }

    fn unavailable(&mut self, view: ForecastView, reason: &str) -> io::Result<()> {
        (**self).unavailable(view, reason)
    }

    fn no_station(&mut self, city: &str) -> io::Result<()> {
        (**self).no_station(city)
    }

    fn cache_stats(&mut self, stats: CacheStats) -> io::Result<()> {
        (**self).cache_stats(stats)
    }
}

/// Plain-text renderer
#[derive(Debug)]
pub struct TerminalRenderer<W> {
    out: W,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn time_label(record: &WeatherRecord) -> String {
    match record.time {
        Some(time) => time.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

fn symbol_label(symbol: Option<u8>) -> &'static str {
    symbol.map(Condition::from_wsymb2).unwrap_or(Condition::Unknown).label()
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn selection(&mut self, view: &SelectionView<'_>) -> io::Result<()> {
        writeln!(
            self.out,
            "{}: {} ({})",
            view.city, view.station.name, view.station.id
        )?;
        if let Some(parameter) = view.parameter {
            writeln!(self.out, "Parameter: {} [{}]", parameter.label, parameter.code)?;
        }
        if !view.available.is_empty() {
            let labels: Vec<&str> = view.available.iter().map(|p| p.label).collect();
            writeln!(self.out, "Available: {}", labels.join(", "))?;
        }
        Ok(())
    }

    fn current(&mut self, record: &WeatherRecord) -> io::Result<()> {
        writeln!(self.out, "\nNow ({} UTC)", time_label(record))?;
        writeln!(
            self.out,
            "  {:>5.1}°C  {}",
            record.value,
            record.condition().label()
        )
    }

    fn hourly(&mut self, records: &[WeatherRecord]) -> io::Result<()> {
        writeln!(self.out, "\nHourly (UTC)")?;
        for record in records {
            writeln!(
                self.out,
                "  {}  {:>5.1}°C  {}",
                time_label(record),
                record.value,
                record.condition().label()
            )?;
        }
        Ok(())
    }

    fn week(&mut self, records: &[WeatherRecord]) -> io::Result<()> {
        writeln!(self.out, "\nWeek")?;
        for record in records {
            writeln!(
                self.out,
                "  {}  {:>5.1}°C  {}",
                record.date.format("%a %d %b"),
                record.value,
                record.condition().label()
            )?;
        }
        Ok(())
    }

    fn daily(&mut self, ranges: &[DayRange]) -> io::Result<()> {
        writeln!(self.out, "\nDaily")?;
        for range in ranges {
            writeln!(
                self.out,
                "  {}  {:>5.1} .. {:>5.1}°C  {}",
                range.date.format("%a %d %b"),
                range.min,
                range.max,
                symbol_label(range.symbol)
            )?;
        }
        Ok(())
    }

    fn observations(&mut self, parameter: &ParameterInfo, records: &[WeatherRecord]) -> io::Result<()> {
        writeln!(self.out, "\n{} (observed, UTC)", parameter.label)?;
        for record in records {
            writeln!(
                self.out,
                "  {} {}  {:.1}",
                record.date.format("%Y-%m-%d"),
                time_label(record),
                record.value
            )?;
        }
        Ok(())
    }

    fn unavailable(&mut self, view: ForecastView, reason: &str) -> io::Result<()> {
        writeln!(self.out, "\n{}: unavailable ({})", view, reason)
    }

    fn no_station(&mut self, city: &str) -> io::Result<()> {
        writeln!(self.out, "No station with data found for \"{}\"", city)
    }

    fn cache_stats(&mut self, stats: CacheStats) -> io::Result<()> {
        writeln!(
            self.out,
            "Cached stations: {} with data, {} without",
            stats.available, stats.unavailable
        )
    }
}
