//! Airport metadata used to place flights on the map.

use crate::types::data_source::DataTable;
use crate::types::station::LatLon;
use crate::weather_data::error::WeatherDataError;
use crate::weather_data::extractor::{float_column, int_column, string_column};
use crate::weather_data::frame_fetcher::FrameFetcher;
use log::{info, warn};
use polars::prelude::DataFrame;
use std::collections::HashMap;

pub type AirportId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Airport {
    pub id: AirportId,
    pub location: LatLon,
    pub state: String,
    pub city: String,
}

/// Every known airport by id.
#[derive(Debug, Clone, Default)]
pub struct AirportDirectory {
    airports: HashMap<AirportId, Airport>,
}

impl AirportDirectory {
    pub async fn load(fetcher: &FrameFetcher) -> Result<Self, WeatherDataError> {
        let frame = fetcher.get_frame(DataTable::Airports).await?;
        let directory = tokio::task::spawn_blocking(move || {
            let df = frame.collect()?;
            Self::from_frame(&df)
        })
        .await??;
        info!("Loaded {} airports", directory.len());
        Ok(directory)
    }

    /// Builds the directory from an airport table. The first row for an id
    /// wins; rows without a usable id or coordinate are dropped.
    pub fn from_frame(df: &DataFrame) -> Result<Self, WeatherDataError> {
        let table = DataTable::Airports;
        let missing = |column: &str| WeatherDataError::MissingColumn {
            table,
            column: column.to_string(),
        };
        let ids = int_column(df, "AIRPORT_ID").ok_or_else(|| missing("AIRPORT_ID"))?;
        let latitudes = float_column(df, "LATITUDE").ok_or_else(|| missing("LATITUDE"))?;
        let longitudes = float_column(df, "LONGITUDE").ok_or_else(|| missing("LONGITUDE"))?;
        let states = string_column(df, table, "State")?;
        let cities = string_column(df, table, "City")?;

        let mut airports = HashMap::new();
        let mut skipped = 0usize;
        for idx in 0..df.height() {
            let (Some(id), Some(lat), Some(lon)) =
                (ids.get(idx), latitudes.get(idx), longitudes.get(idx))
            else {
                skipped += 1;
                continue;
            };
            let location = LatLon(lat, lon);
            if id < 0 || !location.is_valid() {
                skipped += 1;
                continue;
            }
            let id = id as AirportId;
            airports.entry(id).or_insert_with(|| Airport {
                id,
                location,
                state: states.get(idx).unwrap_or_default().trim().to_string(),
                city: cities.get(idx).unwrap_or_default().trim().to_string(),
            });
        }
        if skipped > 0 {
            warn!("Skipped {} airport rows with a missing id or coordinate", skipped);
        }
        Ok(Self { airports })
    }

    pub fn get(&self, id: AirportId) -> Option<&Airport> {
        self.airports.get(&id)
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }
}
