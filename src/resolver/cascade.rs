//! The tiered resolution engine.

use crate::aggregator;
use crate::config::{DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_SOURCE_TIMEOUT};
use crate::error::ResolveError;
use crate::resolver::accumulator::Accumulator;
use crate::resolver::tier::{EmptyReason, SourceFailure, TierReport, TierResult};
use crate::sources::live_api::ForecastClient;
use crate::sources::regional::RegionalFallback;
use crate::stations::locate_station::GeoIndex;
use crate::time::localizer::TimeLocalizer;
use crate::types::data_source::DataTable;
use crate::types::feature::{Feature, FeatureVector, PartialFeatures, SourceTag};
use crate::types::observation::Observation;
use crate::types::query::{Query, QueryTime, RegionalKey};
use crate::types::station::StationId;
use crate::weather_data::error::WeatherDataError;
use crate::weather_data::frame_fetcher::FrameFetcher;
use crate::weather_data::station_series::closest_observation;
use bon::bon;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A resolved vector together with how each tier fared.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub features: FeatureVector,
    /// The UTC instant the features were resolved for.
    pub instant: DateTime<Utc>,
    /// One report per tier, in cascade order.
    pub tiers: Vec<TierReport>,
}

impl Resolution {
    pub fn report(&self, source: SourceTag) -> Option<&TierReport> {
        self.tiers.iter().find(|report| report.source == source)
    }
}

/// Runs the live forecast, nearest stations, regional aggregate and default
/// tiers in that order, merging each into the result.
///
/// Shared state (the station index and loaded tables) is read-only here, so
/// one resolver serves any number of concurrent resolutions.
pub struct TierResolver {
    forecast: Option<ForecastClient>,
    geo_index: Arc<GeoIndex>,
    fetcher: Arc<FrameFetcher>,
    regional: RegionalFallback,
    localizer: TimeLocalizer,
    source_timeout: Duration,
    max_concurrent_fetches: usize,
}

#[bon]
impl TierResolver {
    #[builder]
    pub fn new(
        geo_index: Arc<GeoIndex>,
        fetcher: Arc<FrameFetcher>,
        forecast: Option<ForecastClient>,
        localizer: Option<TimeLocalizer>,
        #[builder(default = DEFAULT_SOURCE_TIMEOUT)] source_timeout: Duration,
        #[builder(default = DEFAULT_MAX_CONCURRENT_FETCHES)] max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            forecast,
            geo_index,
            regional: RegionalFallback::new(Arc::clone(&fetcher)),
            fetcher,
            localizer: localizer.unwrap_or_default(),
            source_timeout,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    pub fn localizer(&self) -> &TimeLocalizer {
        &self.localizer
    }

    /// Resolves the full feature vector for `query`.
    ///
    /// Source failures never surface here; they are recorded in
    /// [`Resolution::tiers`]. When `cancel` fires, in-flight fetches are
    /// dropped and nothing is returned but [`ResolveError::Cancelled`].
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidQuery`] for out-of-range inputs and
    /// [`ResolveError::Localize`] when a local query time can't be converted.
    pub async fn resolve(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Resolution, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        query.validate()?;
        let instant = self.utc_instant(query)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Resolution at ({}, {}) cancelled", query.latitude(), query.longitude());
                Err(ResolveError::Cancelled)
            }
            resolution = self.run_cascade(query, instant) => Ok(resolution),
        }
    }

    pub fn utc_instant(&self, query: &Query) -> Result<DateTime<Utc>, ResolveError> {
        match query.time() {
            QueryTime::Utc(instant) => Ok(*instant),
            QueryTime::Local { date, time } => Ok(self.localizer.to_utc(
                time,
                *date,
                query.latitude(),
                query.longitude(),
            )?),
        }
    }

    async fn run_cascade(&self, query: &Query, instant: DateTime<Utc>) -> Resolution {
        let mut acc = Accumulator::new();
        let mut tiers = Vec::with_capacity(SourceTag::CASCADE.len());

        for source in SourceTag::CASCADE {
            if acc.is_complete() {
                debug!("All slots filled, skipping {}", source);
                tiers.push(TierReport::skipped(source));
                continue;
            }
            let result = match source {
                SourceTag::LiveApi => self.live_tier(query, instant).await,
                SourceTag::NearestStations => self.nearest_tier(query, instant).await,
                SourceTag::RegionalAggregate => self.regional_tier(query, instant).await,
                SourceTag::Default => default_tier(),
            };
            let report = acc.merge(result);
            debug!("{}", report);
            tiers.push(report);
        }

        let features = acc.finish();
        if features.source_tag() == SourceTag::Default {
            warn!(
                "Every tier failed for ({}, {}) at {}, using defaults",
                query.latitude(),
                query.longitude(),
                instant
            );
        }
        Resolution {
            features,
            instant,
            tiers,
        }
    }

    async fn live_tier(&self, query: &Query, instant: DateTime<Utc>) -> TierResult {
        let Some(client) = &self.forecast else {
            return TierResult::failed(SourceTag::LiveApi, SourceFailure::NotConfigured);
        };
        match client.fetch(instant, query.point()).await {
            Ok(features) => TierResult::from_features(SourceTag::LiveApi, features),
            Err(e) => {
                warn!("Forecast unavailable, falling back: {}", e);
                TierResult::failed(SourceTag::LiveApi, e)
            }
        }
    }

    async fn nearest_tier(&self, query: &Query, instant: DateTime<Utc>) -> TierResult {
        let nearby = self
            .geo_index
            .nearest(query.point(), query.max_distance_km(), query.n_nearest());
        if nearby.is_empty() {
            return TierResult::empty(SourceTag::NearestStations, EmptyReason::NoStationsFound);
        }
        let total = nearby.len();

        let mut fetched: Vec<(StationId, Result<Option<Observation>, WeatherDataError>)> =
            stream::iter(nearby)
                .map(|candidate| async move {
                    let id = candidate.station.id;
                    (id, self.station_observation(id, instant).await)
                })
                .buffer_unordered(self.max_concurrent_fetches)
                .collect()
                .await;
        // Completion order is arbitrary; averaging in id order keeps the
        // result reproducible.
        fetched.sort_by_key(|(id, _)| *id);

        let mut observations = Vec::with_capacity(total);
        let mut failures = 0;
        let mut last_error = None;
        for (id, result) in fetched {
            match result {
                Ok(Some(observation)) => observations.push(observation),
                Ok(None) => debug!("Station {} has no reading on {}", id, instant.date_naive()),
                Err(e) => {
                    warn!("Station {} unavailable: {}", id, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if observations.is_empty() {
            return match last_error {
                Some(e) if failures == total => TierResult::failed(SourceTag::NearestStations, e),
                _ => TierResult::empty(SourceTag::NearestStations, EmptyReason::NoObservations),
            };
        }
        TierResult::from_features(SourceTag::NearestStations, aggregator::combine(&observations))
    }

    async fn station_observation(
        &self,
        station_id: StationId,
        instant: DateTime<Utc>,
    ) -> Result<Option<Observation>, WeatherDataError> {
        let fetch = async {
            let frame = self
                .fetcher
                .get_frame(DataTable::StationSeries(station_id))
                .await?;
            tokio::task::spawn_blocking(move || closest_observation(frame, station_id, instant))
                .await?
        };
        match tokio::time::timeout(self.source_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(WeatherDataError::Timeout {
                what: format!("Reading station {}", station_id),
                after: self.source_timeout,
            }),
        }
    }

    async fn regional_tier(&self, query: &Query, instant: DateTime<Utc>) -> TierResult {
        let key = RegionalKey::new(query.origin_state(), query.origin_city(), instant);
        match self.regional.lookup(&key).await {
            Ok(Some(found)) => {
                TierResult::from_features(SourceTag::RegionalAggregate, found.features)
            }
            Ok(None) => {
                TierResult::empty(SourceTag::RegionalAggregate, EmptyReason::NoAggregateMatch)
            }
            Err(e) => TierResult::failed(SourceTag::RegionalAggregate, e),
        }
    }
}

fn default_tier() -> TierResult {
    let zeros = Feature::ALL.into_iter().map(|feature| (feature, 0.0)).collect::<PartialFeatures>();
    TierResult::from_features(SourceTag::Default, zeros)
}
