//! The main entry point: loads the shared reference data once and resolves
//! weather features and flight predictions against it.

use crate::config::ResolverConfig;
use crate::error::{ResolveError, WxCascadeError};
use crate::prediction::airports::AirportDirectory;
use crate::prediction::flight::{self, FlightRequest};
use crate::prediction::model::{CancelModel, DelayModel, FlightModels, FlightPrediction, ModelCache};
use crate::resolver::cascade::{Resolution, TierResolver};
use crate::sources::live_api::ForecastClient;
use crate::stations::locate_station::{GeoIndex, NearbyStation};
use crate::stations::station_table::load_stations;
use crate::time::localizer::TimeLocalizer;
use crate::types::data_source::DataSource;
use crate::types::query::{Query, DEFAULT_MAX_DISTANCE_KM, DEFAULT_N_NEAREST};
use crate::types::station::LatLon;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use crate::weather_data::frame_fetcher::FrameFetcher;
use bon::bon;
use log::info;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Weather feature resolution client.
///
/// Construction loads the station reference table and builds the spatial
/// index; everything after that is shared read-only, so a single instance
/// can serve concurrent callers behind an `Arc`.
///
/// # Examples
///
/// ```rust,no_run
/// # use wxcascade::{WxCascade, WxCascadeError, DataSource, ResolverConfig};
/// # async fn run() -> Result<(), WxCascadeError> {
/// let config = ResolverConfig::builder()
///     .data(DataSource::directory("/srv/airport-weather"))
///     .build();
/// let client = WxCascade::with_config(config).await?;
/// # Ok(())
/// # }
/// ```
pub struct WxCascade {
    resolver: TierResolver,
    geo_index: Arc<GeoIndex>,
    fetcher: Arc<FrameFetcher>,
    airports: ModelCache<AirportDirectory>,
    delay_model: ModelCache<dyn DelayModel>,
    cancel_model: ModelCache<dyn CancelModel>,
}

#[bon]
impl WxCascade {
    /// Creates a client from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WxCascadeError::CacheDirCreation`] if the configured cache
    /// directory cannot be created, and [`WxCascadeError::LocateStation`] if
    /// the station reference table cannot be loaded.
    pub async fn with_config(config: ResolverConfig) -> Result<Self, WxCascadeError> {
        if let Some(cache_dir) = &config.cache_dir {
            ensure_cache_dir_exists(cache_dir)
                .await
                .map_err(|e| WxCascadeError::CacheDirCreation(cache_dir.clone(), e))?;
        }

        let fetcher = Arc::new(FrameFetcher::new(
            config.data.clone(),
            config.cache_dir.as_deref(),
            config.source_timeout,
        ));
        let stations = load_stations(&fetcher, config.cache_dir.as_deref()).await?;
        let geo_index = Arc::new(GeoIndex::new(stations));
        info!("Station index ready with {} stations", geo_index.len());

        let resolver = TierResolver::builder()
            .geo_index(Arc::clone(&geo_index))
            .fetcher(Arc::clone(&fetcher))
            .maybe_forecast(config.forecast.map(ForecastClient::new))
            .source_timeout(config.source_timeout)
            .max_concurrent_fetches(config.max_concurrent_fetches)
            .build();

        Ok(Self {
            resolver,
            geo_index,
            fetcher,
            airports: ModelCache::new(),
            delay_model: ModelCache::new(),
            cancel_model: ModelCache::new(),
        })
    }

    /// Creates a client reading tables from `data`, with the live tier
    /// disabled and tables cached under the system cache directory
    /// (e.g. `~/.cache/wxcascade_cache` on Linux).
    pub async fn new(data: DataSource) -> Result<Self, WxCascadeError> {
        let cache_dir = get_cache_dir().map_err(WxCascadeError::CacheDirResolution)?;
        Self::with_config(
            ResolverConfig::builder()
                .data(data)
                .cache_dir(cache_dir)
                .build(),
        )
        .await
    }

    /// Resolves the complete feature vector for `query`.
    ///
    /// See [`TierResolver::resolve`].
    pub async fn resolve(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Resolution, ResolveError> {
        self.resolver.resolve(query, cancel).await
    }

    /// Stations near `location`, closest first.
    ///
    /// * `.location(LatLon)`: **Required.**
    /// * `.max_distance_km(f64)`: Optional. Defaults to `100.0`.
    /// * `.station_limit(usize)`: Optional. Defaults to `5`.
    #[builder]
    pub fn nearest_stations(
        &self,
        location: LatLon,
        max_distance_km: Option<f64>,
        station_limit: Option<usize>,
    ) -> Vec<NearbyStation> {
        self.geo_index.nearest(
            location,
            max_distance_km.unwrap_or(DEFAULT_MAX_DISTANCE_KM),
            station_limit.unwrap_or(DEFAULT_N_NEAREST),
        )
    }

    pub fn localizer(&self) -> &TimeLocalizer {
        self.resolver.localizer()
    }

    /// The airport directory, loaded on first use.
    pub async fn airports(&self) -> Result<Arc<AirportDirectory>, ResolveError> {
        self.airports
            .get_or_load(|| async {
                AirportDirectory::load(&self.fetcher)
                    .await
                    .map(Arc::new)
                    .map_err(ResolveError::AirportDirectory)
            })
            .await
    }

    /// The trained models, loaded on first use and shared afterwards.
    ///
    /// Each loader runs at most once per client; concurrent callers wait for
    /// the running load. A failed load is retried by the next call.
    pub async fn flight_models<D, DFut, C, CFut, E>(
        &self,
        load_delay: D,
        load_cancel: C,
    ) -> Result<FlightModels, E>
    where
        D: FnOnce() -> DFut,
        DFut: Future<Output = Result<Arc<dyn DelayModel>, E>>,
        C: FnOnce() -> CFut,
        CFut: Future<Output = Result<Arc<dyn CancelModel>, E>>,
    {
        let delay = self.delay_model.get_or_load(load_delay).await?;
        let cancel = self.cancel_model.get_or_load(load_cancel).await?;
        Ok(FlightModels { delay, cancel })
    }

    /// Scores a scheduled flight with the weather at its origin at departure.
    ///
    /// # Errors
    ///
    /// Malformed times, unknown airports, an unloadable airport directory or
    /// cancellation. Weather source failures only degrade the weather input.
    pub async fn predict_flight(
        &self,
        request: &FlightRequest,
        models: &FlightModels,
        cancel: &CancellationToken,
    ) -> Result<FlightPrediction, ResolveError> {
        let airports = self.airports().await?;
        flight::predict_flight(&self.resolver, &airports, request, models, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::model::ModelInput;
    use crate::types::feature::{Feature, SourceTag};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    const FEATURE_HEADER: &str = "HourlyDryBulbTemperature,HourlyWindSpeed,HourlyWindDirection,HourlyDewPointTemperature,HourlyRelativeHumidity,HourlyVisibility,HourlyStationPressure,HourlyWetBulbTemperature";

    fn write(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn seed_tables(dir: &Path) {
        write(
            dir,
            "closest_airport_weather.csv",
            "AIRPORT_ID,STATION_ID,LATITUDE,LONGITUDE,DISTANCE_KM\n\
             10423,13904,30.1831,-97.6799,1.2\n\
             10423,13958,30.3208,-97.7604,14.8\n\
             12892,23174,33.9382,-118.3866,2.1\n",
        );
        write(
            dir,
            "ncei-lcd/13904.csv",
            &format!("UTC_DATE,{}\n2024-01-16T00:53:00,48,10,170,35,60,10,29.5,42\n", FEATURE_HEADER),
        );
        write(
            dir,
            "ncei-lcd/13958.csv",
            &format!("UTC_DATE,{}\n2024-01-16T00:51:00,50,12,190,37,62,9,29.7,44\n", FEATURE_HEADER),
        );
        write(
            dir,
            "airports-list-us.csv",
            "AIRPORT_ID,LATITUDE,LONGITUDE,State,City\n\
             10423,30.1945,-97.6699,TX,Austin\n\
             12892,33.9416,-118.4085,CA,Los Angeles\n",
        );
    }

    struct SumOfWeather;

    impl DelayModel for SumOfWeather {
        fn predict(&self, input: &ModelInput) -> [f64; 4] {
            let total: f64 = input.weather.values().iter().sum();
            [total, total, 0.0, total]
        }
    }

    struct CancelWhenWindy;

    impl CancelModel for CancelWhenWindy {
        fn predict(&self, input: &ModelInput) -> bool {
            input.weather.get(Feature::WindSpeed) > 40.0
        }
    }

    async fn client(dir: &Path, cache_dir: Option<&Path>) -> WxCascade {
        let mut config = ResolverConfig::builder()
            .data(DataSource::directory(dir))
            .build();
        config.cache_dir = cache_dir.map(Path::to_path_buf);
        WxCascade::with_config(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_nearest_stations_builder() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        seed_tables(dir.path());
        let client = client(dir.path(), None).await;

        let near_austin = client
            .nearest_stations()
            .location(LatLon(30.2672, -97.7431))
            .call();
        let ids: Vec<u64> = near_austin.iter().map(|s| s.station.id).collect();
        assert_eq!(ids, vec![13958, 13904]);

        let closest = client
            .nearest_stations()
            .location(LatLon(30.2672, -97.7431))
            .station_limit(1)
            .max_distance_km(8.0)
            .call();
        assert_eq!(closest.len(), 1);
        assert_eq!(closest[0].station.id, 13958);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_averages_station_history() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        seed_tables(dir.path());
        let cache = tempdir()?;
        let client = client(dir.path(), Some(cache.path())).await;

        let query = Query::builder()
            .latitude(30.1945)
            .longitude(-97.6699)
            .time(Utc.with_ymd_and_hms(2024, 1, 16, 1, 0, 0).unwrap())
            .origin_state("TX")
            .origin_city("Austin")
            .build();
        let resolution = client.resolve(&query, &CancellationToken::new()).await?;

        assert_eq!(resolution.features.source_tag(), SourceTag::NearestStations);
        assert_eq!(resolution.features.get(Feature::DryBulbTemperature), 49.0);
        assert_eq!(resolution.features.get(Feature::WindSpeed), 11.0);
        assert!(cache.path().join("stations_index.bin").exists());
        assert!(cache.path().join("series-13904.parquet").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_predict_flight_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        seed_tables(dir.path());
        let client = client(dir.path(), None).await;
        let models = FlightModels {
            delay: Arc::new(SumOfWeather),
            cancel: Arc::new(CancelWhenWindy),
        };

        let request = FlightRequest::builder()
            .airline("WN")
            .origin_airport(10423)
            .destination_airport(12892)
            .date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
            .departure_time("19:00")
            .arrival_time("20:30")
            .build();
        let prediction = client
            .predict_flight(&request, &models, &CancellationToken::new())
            .await?;

        // 19:00 in Austin on Jan 15 is 01:00Z on the 16th.
        assert_eq!(prediction.departure_utc, Utc.with_ymd_and_hms(2024, 1, 16, 1, 0, 0).unwrap());
        assert_eq!(prediction.input.weather.source_tag(), SourceTag::NearestStations);
        assert!(prediction.delays.total > 0.0);
        assert!(!prediction.cancelled);

        let unknown = FlightRequest {
            origin_airport: 99,
            ..request
        };
        assert!(matches!(
            client
                .predict_flight(&unknown, &models, &CancellationToken::new())
                .await,
            Err(ResolveError::UnknownAirport(99))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_flight_models_load_once() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        seed_tables(dir.path());
        let client = client(dir.path(), None).await;
        let loads = AtomicUsize::new(0);

        let load = || {
            client.flight_models(
                || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(Arc::new(SumOfWeather) as Arc<dyn DelayModel>)
                },
                || async { Ok::<_, String>(Arc::new(CancelWhenWindy) as Arc<dyn CancelModel>) },
            )
        };
        let first = load().await?;
        let second = load().await?;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.delay, &second.delay));

        // Loaded models are reused, so these loaders never run.
        let cached = client
            .flight_models(
                || async { Err::<Arc<dyn DelayModel>, _>("unused".to_string()) },
                || async { Err::<Arc<dyn CancelModel>, _>("unused".to_string()) },
            )
            .await;
        assert!(cached.is_ok());
        Ok(())
    }
}
