//! Reduces several stations' readings to one value per feature.

use crate::types::feature::{Feature, PartialFeatures};
use crate::types::observation::Observation;

/// Per-feature arithmetic mean over the observations that report it.
///
/// Each slot is averaged independently: a station missing one feature still
/// contributes the others, and a slot no observation reports stays absent.
/// Values are summed in the order given, so callers pass observations in a
/// fixed order to get bit-identical results.
pub fn combine(observations: &[Observation]) -> PartialFeatures {
    let mut sums = [0.0f64; Feature::COUNT];
    let mut counts = [0usize; Feature::COUNT];

    for observation in observations {
        for (feature, value) in observation.features.iter() {
            if let Some(value) = value {
                sums[feature.index()] += value;
                counts[feature.index()] += 1;
            }
        }
    }

    Feature::ALL
        .into_iter()
        .filter(|feature| counts[feature.index()] > 0)
        .map(|feature| {
            let idx = feature.index();
            (feature, sums[idx] / counts[idx] as f64)
        })
        .collect()
}
