use crate::resolver::tier::{TierOutcome, TierReport, TierResult, TierYield};
use crate::types::feature::{Feature, FeatureVector, SourceTag};

/// Merge state of one resolution.
///
/// A slot takes the first present value any tier offers and is never
/// overwritten afterwards.
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    slots: [Option<(f64, SourceTag)>; Feature::COUNT],
}

impl Accumulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn missing(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.missing() == 0
    }

    pub(crate) fn merge(&mut self, result: TierResult) -> TierReport {
        let features = match result.outcome {
            TierYield::Values(features) => features,
            TierYield::Empty(reason) => {
                return TierReport {
                    source: result.source,
                    filled: 0,
                    outcome: TierOutcome::Empty(reason),
                }
            }
            TierYield::Failed(failure) => {
                return TierReport {
                    source: result.source,
                    filled: 0,
                    outcome: TierOutcome::Failed(failure),
                }
            }
        };

        let mut filled = 0;
        for (feature, value) in features.iter() {
            let slot = &mut self.slots[feature.index()];
            if let (true, Some(value)) = (slot.is_none(), value) {
                *slot = Some((value, result.source));
                filled += 1;
            }
        }

        TierReport {
            source: result.source,
            filled,
            outcome: if filled > 0 {
                TierOutcome::Contributed
            } else {
                TierOutcome::Shadowed
            },
        }
    }

    /// The resolved vector. Slots no tier filled become `0.0` from
    /// [`SourceTag::Default`].
    pub(crate) fn finish(self) -> FeatureVector {
        FeatureVector::from_slots(
            self.slots
                .map(|slot| slot.unwrap_or((0.0, SourceTag::Default))),
        )
    }
}
