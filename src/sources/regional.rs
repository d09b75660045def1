//! Lookup into the precomputed state/city aggregate tables.

use crate::types::data_source::{AggregateGrain, DataTable};
use crate::types::feature::PartialFeatures;
use crate::types::query::RegionalKey;
use crate::weather_data::error::WeatherDataError;
use crate::weather_data::extractor::{feature_columns, features_at};
use crate::weather_data::frame_fetcher::FrameFetcher;
use log::{debug, warn};
use polars::prelude::*;
use std::sync::Arc;

const STATE_COLUMN: &str = "OriginState";
const CITY_COLUMN: &str = "OriginCity";
const DAY_OF_WEEK_COLUMN: &str = "DayOfWeek";
const WEEK_COLUMN: &str = "Week";
const MONTH_COLUMN: &str = "Month";

/// The row that answered a lookup and the table it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionalMatch {
    pub grain: AggregateGrain,
    pub features: PartialFeatures,
}

pub struct RegionalFallback {
    fetcher: Arc<FrameFetcher>,
}

impl RegionalFallback {
    pub fn new(fetcher: Arc<FrameFetcher>) -> Self {
        Self { fetcher }
    }

    /// Walks the aggregate tables from the finest grain to the coarsest and
    /// returns the first matching row of the first table that has one.
    ///
    /// A table that cannot be loaded is skipped. The error is only returned
    /// when no table could be loaded at all.
    pub async fn lookup(
        &self,
        key: &RegionalKey,
    ) -> Result<Option<RegionalMatch>, WeatherDataError> {
        let mut last_error = None;
        let mut any_loaded = false;

        for grain in AggregateGrain::PRIORITY {
            match self.lookup_grain(grain, key).await {
                Ok(Some(features)) => {
                    debug!("Regional match for {} in {}", key.state, grain);
                    return Ok(Some(RegionalMatch { grain, features }));
                }
                Ok(None) => any_loaded = true,
                Err(e) => {
                    warn!("Skipping {} aggregate table: {}", grain, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_loaded => Err(e),
            _ => Ok(None),
        }
    }

    async fn lookup_grain(
        &self,
        grain: AggregateGrain,
        key: &RegionalKey,
    ) -> Result<Option<PartialFeatures>, WeatherDataError> {
        let table = DataTable::Aggregate(grain);
        let frame = self.fetcher.get_frame(table).await?;
        let key = key.clone();
        tokio::task::spawn_blocking(move || first_matching_row(frame, table, &key)).await?
    }
}

/// Filters on every key column `frame` carries and returns the first hit.
pub(crate) fn first_matching_row(
    mut frame: LazyFrame,
    table: DataTable,
    key: &RegionalKey,
) -> Result<Option<PartialFeatures>, WeatherDataError> {
    let schema = frame.collect_schema()?;
    if !schema.contains(STATE_COLUMN) {
        return Err(WeatherDataError::MissingColumn {
            table,
            column: STATE_COLUMN.to_string(),
        });
    }

    let mut predicate = col(STATE_COLUMN)
        .cast(DataType::String)
        .eq(lit(key.state.clone()));
    if schema.contains(CITY_COLUMN) {
        predicate = predicate.and(
            col(CITY_COLUMN)
                .cast(DataType::String)
                .eq(lit(key.city.clone())),
        );
    }
    for (column, value) in [
        (DAY_OF_WEEK_COLUMN, key.day_of_week),
        (WEEK_COLUMN, key.week),
        (MONTH_COLUMN, key.month),
    ] {
        if schema.contains(column) {
            // Float comparison accepts both "3" and "3.0" in the source.
            predicate = predicate.and(col(column).cast(DataType::Float64).eq(lit(f64::from(value))));
        }
    }

    let row = frame.filter(predicate).limit(1).collect()?;
    if row.height() == 0 {
        return Ok(None);
    }
    Ok(Some(features_at(&feature_columns(&row), 0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data_source::DataSource;
    use crate::types::feature::Feature;
    use chrono::{TimeZone, Utc};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    const FEATURE_HEADER: &str = "HourlyDryBulbTemperature,HourlyWindSpeed,HourlyWindDirection,HourlyDewPointTemperature,HourlyRelativeHumidity,HourlyVisibility,HourlyStationPressure,HourlyWetBulbTemperature";

    fn write_table(dir: &Path, grain: AggregateGrain, keys: &str, rows: &[&str]) {
        let path = dir.join(DataTable::Aggregate(grain).path_segment());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut contents = format!("{},{}\n", keys, FEATURE_HEADER);
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        std::fs::write(path, contents).unwrap();
    }

    fn fallback(dir: &Path) -> RegionalFallback {
        RegionalFallback::new(Arc::new(FrameFetcher::new(
            DataSource::directory(dir),
            None,
            Duration::from_secs(5),
        )))
    }

    fn monday_in_chicago() -> RegionalKey {
        // 2024-01-15: Monday (0), ISO week 3, January.
        RegionalKey::new("IL", "Chicago", Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_finest_grain_wins() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        write_table(
            dir.path(),
            AggregateGrain::DayCityState,
            "OriginState,OriginCity,DayOfWeek",
            &[
                "IL,Chicago,1,99,99,99,99,99,99,99,99",
                "IL,Chicago,0,20.5,11,240,12,70,9.5,29.4,17",
                "IL,Chicago,0,1,1,1,1,1,1,1,1",
            ],
        );
        write_table(
            dir.path(),
            AggregateGrain::State,
            "OriginState",
            &["IL,5,5,5,5,5,5,5,5"],
        );

        let found = fallback(dir.path()).lookup(&monday_in_chicago()).await?.unwrap();
        assert_eq!(found.grain, AggregateGrain::DayCityState);
        assert!(found.features.is_complete());
        assert_eq!(found.features.get(Feature::DryBulbTemperature), Some(20.5));
        assert_eq!(found.features.get(Feature::WetBulbTemperature), Some(17.0));
        Ok(())
    }

    #[tokio::test]
    async fn test_falls_through_to_coarser_tables() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        write_table(
            dir.path(),
            AggregateGrain::DayCityState,
            "OriginState,OriginCity,DayOfWeek",
            &["IL,Chicago,4,99,99,99,99,99,99,99,99"],
        );
        write_table(
            dir.path(),
            AggregateGrain::WeekCityState,
            "OriginState,OriginCity,Week",
            &[
                "IL,Springfield,3,88,88,88,88,88,88,88,88",
                "IL,Chicago,3.0,30,3,3,3,3,3,3,",
            ],
        );

        let found = fallback(dir.path()).lookup(&monday_in_chicago()).await?.unwrap();
        assert_eq!(found.grain, AggregateGrain::WeekCityState);
        assert_eq!(found.features.get(Feature::DryBulbTemperature), Some(30.0));
        // Blank cell in the matching row stays absent for the next tier.
        assert_eq!(found.features.get(Feature::WetBulbTemperature), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_match_is_not_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        write_table(
            dir.path(),
            AggregateGrain::State,
            "OriginState",
            &["TX,5,5,5,5,5,5,5,5"],
        );
        assert_eq!(fallback(dir.path()).lookup(&monday_in_chicago()).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_every_table_missing_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = fallback(dir.path()).lookup(&monday_in_chicago()).await;
        assert!(matches!(result, Err(WeatherDataError::FileRead(..))));
        Ok(())
    }

    #[test]
    fn test_table_without_state_column_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let frame = polars::df! { "HourlyWindSpeed" => ["3"] }?.lazy();
        let result = first_matching_row(
            frame,
            DataTable::Aggregate(AggregateGrain::State),
            &monday_in_chicago(),
        );
        assert!(matches!(result, Err(WeatherDataError::MissingColumn { .. })));
        Ok(())
    }
}
