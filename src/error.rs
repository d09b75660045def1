use crate::prediction::airports::AirportId;
use crate::stations::error::LocateStationError;
use crate::time::error::LocalizeError;
use crate::weather_data::error::WeatherDataError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a resolution produced no feature vector.
///
/// Source failures never show up here; they are recovered inside the cascade
/// and reported per tier.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Localize(#[from] LocalizeError),

    #[error("Airport {0} is not in the airport directory")]
    UnknownAirport(AirportId),

    #[error("Airport directory is unavailable")]
    AirportDirectory(#[source] WeatherDataError),

    #[error("Resolution was cancelled")]
    Cancelled,
}

/// Errors raised while constructing a [`crate::WxCascade`].
#[derive(Debug, Error)]
pub enum WxCascadeError {
    #[error(transparent)]
    LocateStation(#[from] LocateStationError),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),
}
