//! The boundary to the trained delay and cancellation models.

use crate::prediction::airports::AirportId;
use crate::resolver::tier::TierReport;
use crate::types::feature::FeatureVector;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// One row of model input.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    /// Monday = 0, of the UTC departure instant.
    pub day_of_week: u32,
    pub airline: String,
    pub origin: AirportId,
    pub destination: AirportId,
    pub distance_km: f64,
    pub dep_hour: u32,
    pub arr_hour: u32,
    pub dep_month: u32,
    pub weather: FeatureVector,
}

/// A trained delay regressor.
///
/// Returns arrival, departure, taxi and total delay in minutes.
pub trait DelayModel: Send + Sync {
    fn predict(&self, input: &ModelInput) -> [f64; 4];
}

/// A trained cancellation classifier.
pub trait CancelModel: Send + Sync {
    fn predict(&self, input: &ModelInput) -> bool;
}

#[derive(Clone)]
pub struct FlightModels {
    pub delay: Arc<dyn DelayModel>,
    pub cancel: Arc<dyn CancelModel>,
}

/// Predicted delays in minutes, never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayPrediction {
    pub arrival: f64,
    pub departure: f64,
    pub taxi: f64,
    pub total: f64,
}

impl From<[f64; 4]> for DelayPrediction {
    fn from(raw: [f64; 4]) -> Self {
        let [arrival, departure, taxi, total] = raw.map(|minutes| minutes.max(0.0));
        Self {
            arrival,
            departure,
            taxi,
            total,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlightPrediction {
    pub departure_utc: DateTime<Utc>,
    pub arrival_utc: DateTime<Utc>,
    pub input: ModelInput,
    pub delays: DelayPrediction,
    pub cancelled: bool,
    /// How the weather for `input` was resolved.
    pub weather_tiers: Vec<TierReport>,
}

/// Holds an artifact that is expensive to load, such as a deserialized model.
///
/// The first caller runs the loader; concurrent callers wait for it and get
/// the same `Arc`. A failed load is not kept and the next caller retries.
pub struct ModelCache<T: ?Sized> {
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Default for ModelCache<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T: ?Sized> ModelCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<T>, E>>,
    {
        self.cell.get_or_try_init(load).await.cloned()
    }
}
