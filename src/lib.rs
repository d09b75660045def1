//! Resolves the eight surface weather features used by flight delay models,
//! falling back from a live forecast API to nearby station history, regional
//! aggregates and finally zeros.
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use tokio_util::sync::CancellationToken;
//! use wxcascade::{DataSource, Query, WxCascade};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WxCascade::new(DataSource::directory("/srv/airport-weather")).await?;
//! let query = Query::builder()
//!     .latitude(30.1945)
//!     .longitude(-97.6699)
//!     .time(wxcascade::QueryTime::local(
//!         NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!         "18:30",
//!     ))
//!     .origin_state("TX")
//!     .origin_city("Austin")
//!     .build();
//!
//! let resolution = client.resolve(&query, &CancellationToken::new()).await?;
//! println!("{:?} from {}", resolution.features.values(), resolution.features.source_tag());
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod config;
mod error;
mod prediction;
mod resolver;
mod sources;
mod stations;
mod time;
mod types;
mod utils;
mod weather_data;
mod wxcascade;

pub use error::{ResolveError, WxCascadeError};
pub use wxcascade::*;

pub use config::*;

pub use types::data_source::*;
pub use types::feature::*;
pub use types::observation::Observation;
pub use types::query::*;
pub use types::station::*;

pub use aggregator::combine;
pub use stations::locate_station::{haversine_km, GeoIndex, NearbyStation};
pub use stations::station_table::{load_stations, parse_stations};
pub use weather_data::frame_fetcher::FrameFetcher;
pub use weather_data::station_series::closest_observation;

pub use sources::live_api::{hpa_to_inhg, nmi_to_miles, ForecastClient, PARAMETERS};
pub use sources::regional::{RegionalFallback, RegionalMatch};

pub use resolver::cascade::{Resolution, TierResolver};
pub use resolver::tier::*;

pub use time::localizer::{validate_time_format, TimeLocalizer, TimezoneLookup, TzfLookup};

pub use prediction::airports::{Airport, AirportDirectory, AirportId};
pub use prediction::flight::FlightRequest;
pub use prediction::model::*;

pub use stations::error::LocateStationError;
pub use time::error::LocalizeError;
pub use weather_data::error::WeatherDataError;
