//! The fixed eight-slot weather feature schema consumed by the delay models,
//! in its partial (per-slot presence) and fully resolved forms.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// One of the eight canonical weather features.
///
/// The discriminant doubles as the slot index inside [`PartialFeatures`] and
/// [`FeatureVector`], so the order here is the order of the model's columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    DryBulbTemperature,
    WindSpeed,
    WindDirection,
    DewPointTemperature,
    RelativeHumidity,
    Visibility,
    StationPressure,
    WetBulbTemperature,
}

impl Feature {
    pub const COUNT: usize = 8;

    /// All features in slot order.
    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::DryBulbTemperature,
        Feature::WindSpeed,
        Feature::WindDirection,
        Feature::DewPointTemperature,
        Feature::RelativeHumidity,
        Feature::Visibility,
        Feature::StationPressure,
        Feature::WetBulbTemperature,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Column name used by the station series and regional aggregate tables.
    pub const fn column_name(self) -> &'static str {
        match self {
            Feature::DryBulbTemperature => "HourlyDryBulbTemperature",
            Feature::WindSpeed => "HourlyWindSpeed",
            Feature::WindDirection => "HourlyWindDirection",
            Feature::DewPointTemperature => "HourlyDewPointTemperature",
            Feature::RelativeHumidity => "HourlyRelativeHumidity",
            Feature::Visibility => "HourlyVisibility",
            Feature::StationPressure => "HourlyStationPressure",
            Feature::WetBulbTemperature => "HourlyWetBulbTemperature",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// The data source a feature value came from, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTag {
    LiveApi,
    NearestStations,
    RegionalAggregate,
    Default,
}

impl SourceTag {
    /// Every tier in the order the resolver attempts them.
    pub const CASCADE: [SourceTag; 4] = [
        SourceTag::LiveApi,
        SourceTag::NearestStations,
        SourceTag::RegionalAggregate,
        SourceTag::Default,
    ];
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceTag::LiveApi => "live-api",
            SourceTag::NearestStations => "nearest-stations",
            SourceTag::RegionalAggregate => "regional-aggregate",
            SourceTag::Default => "default",
        };
        f.write_str(name)
    }
}

/// A feature vector where any slot may still be absent.
///
/// Non-finite values are never stored; setting one leaves the slot absent, so
/// a `NaN` from a source can't masquerade as data.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialFeatures {
    values: [Option<f64>; Feature::COUNT],
}

impl PartialFeatures {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        self.values[feature.index()] = value.filter(|v| v.is_finite());
    }

    /// Builder-style [`PartialFeatures::set`] for a present value.
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, Some(value));
        self
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.present_count() == Feature::COUNT
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, Option<f64>)> + '_ {
        Feature::ALL.iter().map(|&feature| (feature, self.get(feature)))
    }
}

impl FromIterator<(Feature, f64)> for PartialFeatures {
    fn from_iter<I: IntoIterator<Item = (Feature, f64)>>(iter: I) -> Self {
        let mut partial = PartialFeatures::empty();
        for (feature, value) in iter {
            partial.set(feature, Some(value));
        }
        partial
    }
}

/// The resolved, always fully populated feature vector.
///
/// Each slot remembers which tier supplied it. Construct one through the
/// resolver; there is no way to build a vector with a missing slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; Feature::COUNT],
    sources: [SourceTag; Feature::COUNT],
}

impl FeatureVector {
    pub(crate) fn from_slots(slots: [(f64, SourceTag); Feature::COUNT]) -> Self {
        Self {
            values: slots.map(|(value, _)| value),
            sources: slots.map(|(_, source)| source),
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// All values in slot order (the order of [`Feature::ALL`]).
    pub fn values(&self) -> [f64; Feature::COUNT] {
        self.values
    }

    pub fn slot_source(&self, feature: Feature) -> SourceTag {
        self.sources[feature.index()]
    }

    /// Tiers that supplied at least one slot, in cascade order.
    pub fn contributing_tiers(&self) -> Vec<SourceTag> {
        SourceTag::CASCADE
            .into_iter()
            .filter(|tier| self.sources.contains(tier))
            .collect()
    }

    /// The first tier in cascade order that supplied data.
    ///
    /// This is [`SourceTag::Default`] only when every slot was zero-filled.
    pub fn source_tag(&self) -> SourceTag {
        self.contributing_tiers()
            .first()
            .copied()
            .unwrap_or(SourceTag::Default)
    }

    /// True when any slot came from somewhere other than the live forecast.
    pub fn is_degraded(&self) -> bool {
        self.sources.iter().any(|source| *source != SourceTag::LiveApi)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(|&feature| (feature, self.get(feature)))
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.values[feature.index()]
    }
}
