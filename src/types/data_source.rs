//! Where the read-only reference tables live and which tables exist.

use crate::types::station::StationId;
use std::fmt;
use std::path::PathBuf;

/// The location of the reference tables.
///
/// Every table is addressed by a fixed path relative to this root (see
/// [`DataTable::path_segment`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Plain CSV files under a local directory.
    Directory(PathBuf),
    /// CSV files under an HTTP(S) base URL. With `gzip`, each file is fetched
    /// as `<path>.gz` and decompressed on the fly.
    Remote { base_url: String, gzip: bool },
}

impl DataSource {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        DataSource::Directory(path.into())
    }

    pub fn remote(base_url: impl Into<String>) -> Self {
        DataSource::Remote {
            base_url: base_url.into(),
            gzip: false,
        }
    }
}

/// Grain of a precomputed regional aggregate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateGrain {
    DayCityState,
    WeekCityState,
    MonthCityState,
    CityState,
    State,
}

impl AggregateGrain {
    /// Finest to coarsest; the order regional lookups try them in.
    pub const PRIORITY: [AggregateGrain; 5] = [
        AggregateGrain::DayCityState,
        AggregateGrain::WeekCityState,
        AggregateGrain::MonthCityState,
        AggregateGrain::CityState,
        AggregateGrain::State,
    ];

    pub(crate) fn file_stem(&self) -> &'static str {
        match self {
            AggregateGrain::DayCityState => "airport_weather_summary_by_state_city_day",
            AggregateGrain::WeekCityState => "airport_weather_summary_by_state_city_week",
            AggregateGrain::MonthCityState => "airport_weather_summary_by_state_city_month",
            AggregateGrain::CityState => "airport_weather_summary_by_state_city",
            AggregateGrain::State => "airport_weather_summary_by_state",
        }
    }
}

impl fmt::Display for AggregateGrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateGrain::DayCityState => "day+city+state",
            AggregateGrain::WeekCityState => "week+city+state",
            AggregateGrain::MonthCityState => "month+city+state",
            AggregateGrain::CityState => "city+state",
            AggregateGrain::State => "state",
        };
        f.write_str(name)
    }
}

/// One reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataTable {
    /// Station metadata used to build the spatial index.
    StationIndex,
    /// The historical hourly series of one station.
    StationSeries(StationId),
    /// A regional aggregate table.
    Aggregate(AggregateGrain),
    /// Airport metadata (coordinates, state, city).
    Airports,
}

impl DataTable {
    /// Path of the CSV file relative to the [`DataSource`] root.
    pub(crate) fn path_segment(&self) -> String {
        match self {
            DataTable::StationIndex => "closest_airport_weather.csv".to_string(),
            DataTable::StationSeries(id) => format!("ncei-lcd/{}.csv", id),
            DataTable::Aggregate(grain) => format!("aggregate/{}.csv", grain.file_stem()),
            DataTable::Airports => "airports-list-us.csv".to_string(),
        }
    }

    pub(crate) fn cache_file_name(&self) -> String {
        match self {
            DataTable::StationIndex => "station-index.parquet".to_string(),
            DataTable::StationSeries(id) => format!("series-{}.parquet", id),
            DataTable::Aggregate(grain) => format!("aggregate-{}.parquet", grain.file_stem()),
            DataTable::Airports => "airports.parquet".to_string(),
        }
    }
}

impl fmt::Display for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataTable::StationIndex => write!(f, "station index"),
            DataTable::StationSeries(id) => write!(f, "series for station {}", id),
            DataTable::Aggregate(grain) => write!(f, "{} aggregate", grain),
            DataTable::Airports => write!(f, "airport directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(DataTable::StationSeries(72254).path_segment(), "ncei-lcd/72254.csv");
        assert_eq!(
            DataTable::Aggregate(AggregateGrain::State).path_segment(),
            "aggregate/airport_weather_summary_by_state.csv"
        );
        assert_eq!(
            DataTable::Aggregate(AggregateGrain::PRIORITY[0]).to_string(),
            "day+city+state aggregate"
        );
    }
}
