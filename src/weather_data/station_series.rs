//! Picks the observation closest to a query instant out of a station's
//! historical series.

use crate::types::data_source::DataTable;
use crate::types::observation::Observation;
use crate::types::station::StationId;
use crate::weather_data::error::WeatherDataError;
use crate::weather_data::extractor::{feature_columns, features_at, string_column};
use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;

pub(crate) const TIMESTAMP_COLUMN: &str = "UTC_DATE";

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Finds the row on `instant`'s UTC calendar date whose timestamp is closest
/// to `instant`; ties go to the earlier timestamp.
///
/// Returns `Ok(None)` when the station has no row for that date.
pub fn closest_observation(
    frame: LazyFrame,
    station_id: StationId,
    instant: DateTime<Utc>,
) -> Result<Option<Observation>, WeatherDataError> {
    let table = DataTable::StationSeries(station_id);
    let date = instant.date_naive();
    let date_prefix = date.format("%Y-%m-%d").to_string();

    let day = frame
        .filter(
            col(TIMESTAMP_COLUMN)
                .cast(DataType::String)
                .str()
                .starts_with(lit(date_prefix)),
        )
        .collect()
        .map_err(|e| match e {
            PolarsError::ColumnNotFound(_) => WeatherDataError::MissingColumn {
                table,
                column: TIMESTAMP_COLUMN.to_string(),
            },
            other => WeatherDataError::DataFrameProcessing(other),
        })?;

    if day.height() == 0 {
        return Ok(None);
    }

    let timestamps = string_column(&day, table, TIMESTAMP_COLUMN)?;
    let closest = timestamps
        .into_iter()
        .enumerate()
        .filter_map(|(idx, raw)| Some((idx, parse_timestamp(raw?)?)))
        .filter(|(_, timestamp)| timestamp.date_naive() == date)
        .min_by_key(|(_, timestamp)| ((*timestamp - instant).abs(), *timestamp));

    let Some((idx, timestamp)) = closest else {
        return Ok(None);
    };

    let columns = feature_columns(&day);
    Ok(Some(Observation {
        station_id,
        timestamp,
        features: features_at(&columns, idx),
    }))
}
