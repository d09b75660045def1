//! Helpers for pulling typed values out of string-typed table frames.

use crate::types::data_source::DataTable;
use crate::types::feature::{Feature, PartialFeatures};
use crate::weather_data::error::WeatherDataError;
use polars::prelude::*;

/// A numeric view of `name`, or `None` when the table doesn't carry it.
/// Cells that don't parse as numbers become nulls.
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Option<Float64Chunked> {
    let column = df.column(name).ok()?;
    let cast = column.cast(&DataType::Float64).ok()?;
    cast.f64().ok().cloned()
}

/// Like [`float_column`] but for integer keys.
pub(crate) fn int_column(df: &DataFrame, name: &str) -> Option<Int64Chunked> {
    let column = df.column(name).ok()?;
    let cast = column.cast(&DataType::Int64).ok()?;
    cast.i64().ok().cloned()
}

pub(crate) fn string_column(
    df: &DataFrame,
    table: DataTable,
    name: &str,
) -> Result<StringChunked, WeatherDataError> {
    let column = df
        .column(name)
        .map_err(|_| WeatherDataError::MissingColumn {
            table,
            column: name.to_string(),
        })?;
    Ok(column.cast(&DataType::String)?.str()?.clone())
}

/// The eight feature columns in slot order; absent columns stay `None`.
pub(crate) fn feature_columns(df: &DataFrame) -> [Option<Float64Chunked>; Feature::COUNT] {
    Feature::ALL.map(|feature| float_column(df, feature.column_name()))
}

pub(crate) fn features_at(
    columns: &[Option<Float64Chunked>; Feature::COUNT],
    idx: usize,
) -> PartialFeatures {
    let mut features = PartialFeatures::empty();
    for feature in Feature::ALL {
        let value = columns[feature.index()]
            .as_ref()
            .and_then(|column| column.get(idx));
        features.set(feature, value);
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_numeric_cells_are_absent() -> Result<(), PolarsError> {
        let df = polars::df! {
            "HourlyVisibility" => ["10.00", "9.94s", ""],
            "HourlyWindSpeed" => ["5", "7", "M"],
        }?;
        let columns = feature_columns(&df);

        let first = features_at(&columns, 0);
        assert_eq!(first.get(Feature::Visibility), Some(10.0));
        assert_eq!(first.get(Feature::WindSpeed), Some(5.0));
        assert_eq!(first.get(Feature::DryBulbTemperature), None);

        let second = features_at(&columns, 1);
        assert_eq!(second.get(Feature::Visibility), None);
        assert_eq!(second.get(Feature::WindSpeed), Some(7.0));

        assert!(features_at(&columns, 2).is_empty());
        Ok(())
    }
}
