//! What one tier of the cascade hands back, and how it went.

use crate::types::feature::{PartialFeatures, SourceTag};
use crate::weather_data::error::WeatherDataError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a tier could not be consulted at all.
#[derive(Debug, Clone, Error)]
pub enum SourceFailure {
    #[error("source is not configured")]
    NotConfigured,

    #[error("source unavailable: {0}")]
    Unavailable(#[source] Arc<WeatherDataError>),
}

impl From<WeatherDataError> for SourceFailure {
    fn from(e: WeatherDataError) -> Self {
        SourceFailure::Unavailable(Arc::new(e))
    }
}

/// Why a tier that ran produced no values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The source answered but every value was missing.
    NoValues,
    NoStationsFound,
    /// Stations were in range but none had a reading on the query date.
    NoObservations,
    NoAggregateMatch,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            EmptyReason::NoValues => "no values",
            EmptyReason::NoStationsFound => "no stations found",
            EmptyReason::NoObservations => "no observations on that date",
            EmptyReason::NoAggregateMatch => "no aggregate match",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone)]
pub enum TierYield {
    Values(PartialFeatures),
    Empty(EmptyReason),
    Failed(SourceFailure),
}

/// The output of one tier before it is merged.
#[derive(Debug, Clone)]
pub struct TierResult {
    pub source: SourceTag,
    pub outcome: TierYield,
}

impl TierResult {
    /// Values from a tier; an all-absent vector counts as
    /// [`EmptyReason::NoValues`].
    pub fn from_features(source: SourceTag, features: PartialFeatures) -> Self {
        let outcome = if features.is_empty() {
            TierYield::Empty(EmptyReason::NoValues)
        } else {
            TierYield::Values(features)
        };
        Self { source, outcome }
    }

    pub fn empty(source: SourceTag, reason: EmptyReason) -> Self {
        Self {
            source,
            outcome: TierYield::Empty(reason),
        }
    }

    pub fn failed(source: SourceTag, failure: impl Into<SourceFailure>) -> Self {
        Self {
            source,
            outcome: TierYield::Failed(failure.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TierOutcome {
    /// Filled at least one slot.
    Contributed,
    /// Ran, but every value it had was for a slot an earlier tier filled.
    Shadowed,
    Empty(EmptyReason),
    Failed(SourceFailure),
    /// Not run because every slot was already filled.
    Skipped,
}

/// Per-tier record kept alongside a resolved vector.
#[derive(Debug, Clone)]
pub struct TierReport {
    pub source: SourceTag,
    /// Slots this tier filled in the accumulator.
    pub filled: usize,
    pub outcome: TierOutcome,
}

impl TierReport {
    pub(crate) fn skipped(source: SourceTag) -> Self {
        Self {
            source,
            filled: 0,
            outcome: TierOutcome::Skipped,
        }
    }
}

impl fmt::Display for TierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            TierOutcome::Contributed => write!(f, "{}: filled {}", self.source, self.filled),
            TierOutcome::Shadowed => write!(f, "{}: nothing new", self.source),
            TierOutcome::Empty(reason) => write!(f, "{}: {}", self.source, reason),
            TierOutcome::Failed(failure) => write!(f, "{}: {}", self.source, failure),
            TierOutcome::Skipped => write!(f, "{}: skipped", self.source),
        }
    }
}
