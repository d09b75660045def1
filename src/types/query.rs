//! The per-request inputs to a resolution.

use crate::error::ResolveError;
use crate::types::station::LatLon;
use bon::Builder;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_DISTANCE_KM: f64 = 100.0;
pub const DEFAULT_N_NEAREST: usize = 5;

/// When the weather is wanted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryTime {
    /// An absolute instant.
    Utc(DateTime<Utc>),
    /// A wall-clock `HH:MM` on `date` at the query coordinate. The resolver
    /// localizes it before any tier runs.
    Local { date: NaiveDate, time: String },
}

impl QueryTime {
    pub fn local(date: NaiveDate, time: impl Into<String>) -> Self {
        QueryTime::Local {
            date,
            time: time.into(),
        }
    }
}

impl From<DateTime<Utc>> for QueryTime {
    fn from(instant: DateTime<Utc>) -> Self {
        QueryTime::Utc(instant)
    }
}

/// A request for the weather features at one point and time.
///
/// Immutable once built.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use wxcascade::Query;
///
/// let query = Query::builder()
///     .latitude(30.1945)
///     .longitude(-97.6699)
///     .time(Utc.with_ymd_and_hms(2024, 3, 8, 14, 0, 0).unwrap())
///     .origin_state("TX")
///     .origin_city("Austin")
///     .build();
///
/// assert_eq!(query.max_distance_km(), 100.0);
/// assert_eq!(query.n_nearest(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct Query {
    latitude: f64,
    longitude: f64,
    #[builder(into)]
    time: QueryTime,
    #[builder(into)]
    origin_state: String,
    #[builder(into)]
    origin_city: String,
    #[builder(default = DEFAULT_MAX_DISTANCE_KM)]
    max_distance_km: f64,
    #[builder(default = DEFAULT_N_NEAREST)]
    n_nearest: usize,
}

impl Query {
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn point(&self) -> LatLon {
        LatLon(self.latitude, self.longitude)
    }

    pub fn time(&self) -> &QueryTime {
        &self.time
    }

    pub fn origin_state(&self) -> &str {
        &self.origin_state
    }

    pub fn origin_city(&self) -> &str {
        &self.origin_city
    }

    pub fn max_distance_km(&self) -> f64 {
        self.max_distance_km
    }

    pub fn n_nearest(&self) -> usize {
        self.n_nearest
    }

    pub(crate) fn validate(&self) -> Result<(), ResolveError> {
        if !self.point().is_valid() {
            return Err(ResolveError::InvalidQuery(format!(
                "coordinate ({}, {}) is out of range",
                self.latitude, self.longitude
            )));
        }
        if !(self.max_distance_km.is_finite() && self.max_distance_km >= 0.0) {
            return Err(ResolveError::InvalidQuery(format!(
                "max distance {} km must be a non-negative number",
                self.max_distance_km
            )));
        }
        if self.origin_state.trim().is_empty() {
            return Err(ResolveError::InvalidQuery(
                "origin state is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Keys used to pick a row out of the regional aggregate tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalKey {
    pub state: String,
    pub city: String,
    /// Monday = 0.
    pub day_of_week: u32,
    /// ISO week of the year.
    pub week: u32,
    pub month: u32,
}

impl RegionalKey {
    pub fn new(state: impl Into<String>, city: impl Into<String>, instant: DateTime<Utc>) -> Self {
        Self {
            state: state.into(),
            city: city.into(),
            day_of_week: instant.weekday().num_days_from_monday(),
            week: instant.iso_week().week(),
            month: instant.month(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> Query {
        Query::builder()
            .latitude(41.9742)
            .longitude(-87.9073)
            .time(Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap())
            .origin_state("IL")
            .origin_city("Chicago")
            .build()
    }

    #[test]
    fn test_defaults_applied() {
        let query = base();
        assert_eq!(query.max_distance_km(), DEFAULT_MAX_DISTANCE_KM);
        assert_eq!(query.n_nearest(), DEFAULT_N_NEAREST);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_coordinate_rejected() {
        let query = Query::builder()
            .latitude(91.0)
            .longitude(0.0)
            .time(Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap())
            .origin_state("IL")
            .origin_city("Chicago")
            .build();
        assert!(matches!(
            query.validate(),
            Err(ResolveError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_negative_distance_rejected() {
        let query = Query::builder()
            .latitude(41.0)
            .longitude(-87.0)
            .time(Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap())
            .origin_state("IL")
            .origin_city("Chicago")
            .max_distance_km(-1.0)
            .build();
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_regional_key_from_instant() {
        // 2024-01-15 is a Monday in ISO week 3.
        let key = RegionalKey::new(
            "IL",
            "Chicago",
            Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap(),
        );
        assert_eq!(key.day_of_week, 0);
        assert_eq!(key.week, 3);
        assert_eq!(key.month, 1);
    }
}
