//! Weather stations from the station reference table, and the `rstar`
//! implementations that let them live in the spatial index.

use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// Numeric station identifier as used in the reference table and the
/// per-station series file names.
pub type StationId = u64;

/// A geographical coordinate, latitude first.
///
/// # Examples
///
/// ```
/// use wxcascade::LatLon;
///
/// let austin = LatLon(30.2672, -97.7431);
/// assert_eq!(austin.0, 30.2672);
/// assert_eq!(austin.1, -97.7431);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }

    /// Both components are finite and inside the valid degree ranges.
    pub fn is_valid(&self) -> bool {
        self.0.is_finite()
            && self.1.is_finite()
            && (-90.0..=90.0).contains(&self.0)
            && (-180.0..=180.0).contains(&self.1)
    }
}

/// A fixed-location source of historical observations.
///
/// Loaded once from the station reference table and never mutated afterwards.
/// The distance to a query point is computed per search and returned beside
/// the station (see [`crate::NearbyStation`]); it is not stored here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    pub id: StationId,
    pub location: LatLon,
    /// Distance to the airport the reference table row was computed for,
    /// if the table carries one.
    pub reference_distance_km: Option<f64>,
}

impl RTreeObject for Station {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.0, self.location.1])
    }
}

impl PointDistance for Station {
    /// Squared Euclidean distance in degree space.
    ///
    /// Only used to walk the R-tree in rough proximity order; real distances
    /// are always great-circle kilometres.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.location.0 - point[0];
        let dy = self.location.1 - point[1];
        dx * dx + dy * dy
    }
}
