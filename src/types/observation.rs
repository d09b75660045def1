use crate::types::feature::PartialFeatures;
use crate::types::station::StationId;
use chrono::{DateTime, Utc};

/// One station's historical reading at a UTC instant. Any feature may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_id: StationId,
    pub timestamp: DateTime<Utc>,
    pub features: PartialFeatures,
}
