use crate::types::station::{LatLon, Station};
use haversine::{distance, Location as HaversineLocation, Units};
use ordered_float::OrderedFloat;
use rstar::{PointDistance, RTree};

/// Kilometres per degree of latitude on the 6371 km sphere.
const KM_PER_DEGREE: f64 = 6371.0 * std::f64::consts::PI / 180.0;

/// Great-circle distance in kilometres on a sphere of radius 6371 km.
pub fn haversine_km(a: LatLon, b: LatLon) -> f64 {
    distance(
        HaversineLocation {
            latitude: a.0,
            longitude: a.1,
        },
        HaversineLocation {
            latitude: b.0,
            longitude: b.1,
        },
        Units::Kilometers,
    )
}

/// A station returned by [`GeoIndex::nearest`], with its distance to the
/// query point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyStation {
    pub station: Station,
    pub distance_km: f64,
}

/// Nearest-station search over the static station metadata.
#[derive(Debug, Clone)]
pub struct GeoIndex {
    rtree: RTree<Station>,
}

impl GeoIndex {
    pub fn new(stations: Vec<Station>) -> Self {
        GeoIndex {
            rtree: RTree::bulk_load(stations),
        }
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `n` stations within `max_distance_km` of `point`, closest first.
    ///
    /// Stations at equal distance are ordered by id. An empty result is not an
    /// error.
    pub fn nearest(&self, point: LatLon, max_distance_km: f64, n: usize) -> Vec<NearbyStation> {
        if n == 0 || !(max_distance_km >= 0.0) {
            return vec![];
        }

        let mut candidates: Vec<NearbyStation> = self
            .candidates(point, max_distance_km)
            .into_iter()
            .filter_map(|station| {
                let distance_km = haversine_km(point, station.location);
                (distance_km <= max_distance_km).then(|| NearbyStation {
                    station: station.clone(),
                    distance_km,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            OrderedFloat(a.distance_km)
                .cmp(&OrderedFloat(b.distance_km))
                .then(a.station.id.cmp(&b.station.id))
        });
        candidates.truncate(n);
        candidates
    }

    /// Every station that could lie within `max_distance_km` of `point`.
    ///
    /// A point within `d` km can differ by at most `d / KM_PER_DEGREE` degrees
    /// of latitude, and by at most that divided by `cos(highest latitude
    /// reachable)` degrees of longitude, so walking the R-tree until the
    /// degree-space distance exceeds the diagonal of those two bounds misses
    /// nothing. Near a pole the bound degenerates and every station is a
    /// candidate.
    fn candidates(&self, point: LatLon, max_distance_km: f64) -> Vec<&Station> {
        let lat_span = max_distance_km / KM_PER_DEGREE;
        let highest_lat = point.0.abs() + lat_span;
        if highest_lat >= 89.0 {
            return self.rtree.iter().collect();
        }
        let lon_span = (lat_span / highest_lat.to_radians().cos()).min(360.0);
        let radius_2 = lat_span * lat_span + lon_span * lon_span;

        // Stations across the antimeridian are found by also searching from
        // the query point shifted by a full turn.
        let mut origins = vec![[point.0, point.1]];
        if point.1 + lon_span > 180.0 {
            origins.push([point.0, point.1 - 360.0]);
        }
        if point.1 - lon_span < -180.0 {
            origins.push([point.0, point.1 + 360.0]);
        }

        origins
            .iter()
            .flat_map(|origin| {
                self.rtree
                    .nearest_neighbor_iter(origin)
                    .take_while(move |station| station.distance_2(origin) <= radius_2)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: u64, latitude: f64, longitude: f64) -> Station {
        Station {
            id,
            location: LatLon(latitude, longitude),
            reference_distance_km: None,
        }
    }

    fn texas() -> GeoIndex {
        GeoIndex::new(vec![
            station(13904, 30.1831, -97.6799), // Austin-Bergstrom
            station(13958, 30.3208, -97.7604), // Camp Mabry
            station(12921, 29.5443, -98.4839), // San Antonio
            station(13960, 32.8975, -97.0219), // DFW
            station(12960, 29.9844, -95.3608), // Houston IAH
        ])
    }

    #[test]
    fn test_haversine_identity_and_symmetry() {
        let a = LatLon(30.2672, -97.7431);
        let b = LatLon(40.6413, -73.7781);
        assert_eq!(haversine_km(a, a), 0.0);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
        // Austin to JFK is roughly 2440 km.
        assert!((haversine_km(a, b) - 2440.0).abs() < 20.0);
    }

    #[test]
    fn test_nearest_filters_sorts_and_truncates() {
        let index = texas();
        let austin = LatLon(30.2672, -97.7431);

        let results = index.nearest(austin, 150.0, 5);
        let ids: Vec<u64> = results.iter().map(|r| r.station.id).collect();
        assert_eq!(ids, vec![13958, 13904, 12921]);

        let mut last = 0.0;
        for result in &results {
            assert!(result.distance_km <= 150.0);
            assert!(result.distance_km >= last);
            last = result.distance_km;
        }

        let top_one = index.nearest(austin, 100.0, 1);
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].station.id, 13958);
    }

    #[test]
    fn test_equal_distances_order_by_id() {
        let index = GeoIndex::new(vec![
            station(30, 10.0, 20.5),
            station(10, 10.0, 20.5),
            station(20, 10.0, 20.5),
            station(5, 10.0, 20.9),
        ]);
        let ids: Vec<u64> = index
            .nearest(LatLon(10.0, 20.0), 200.0, 3)
            .iter()
            .map(|r| r.station.id)
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_no_station_in_range_is_empty() {
        let index = texas();
        assert!(index.nearest(LatLon(0.0, 0.0), 100.0, 5).is_empty());
        assert!(index.nearest(LatLon(30.2672, -97.7431), 100.0, 0).is_empty());
        assert!(index.nearest(LatLon(30.2672, -97.7431), -1.0, 5).is_empty());
    }

    #[test]
    fn test_search_crosses_antimeridian() {
        let index = GeoIndex::new(vec![station(1, 51.0, 179.9), station(2, 51.0, -179.9)]);
        let results = index.nearest(LatLon(51.0, 179.95), 50.0, 5);
        let ids: Vec<u64> = results.iter().map(|r| r.station.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_high_latitude_longitude_spread_is_found() {
        // At 70N, 2 degrees of longitude is only ~76 km.
        let index = GeoIndex::new(vec![station(1, 70.0, 22.0)]);
        let results = index.nearest(LatLon(70.0, 20.0), 100.0, 5);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_matches_brute_force() {
        let stations: Vec<Station> = (0..400)
            .map(|i| {
                let lat = -60.0 + (i as f64 * 7.31) % 120.0;
                let lon = -180.0 + (i as f64 * 13.17) % 360.0;
                station(i, lat, lon)
            })
            .collect();
        let index = GeoIndex::new(stations.clone());

        for point in [LatLon(0.0, 0.0), LatLon(45.0, -120.0), LatLon(-33.0, 151.0)] {
            let mut expected: Vec<(u64, f64)> = stations
                .iter()
                .map(|s| (s.id, haversine_km(point, s.location)))
                .filter(|(_, d)| *d <= 1500.0)
                .collect();
            expected.sort_by(|a, b| OrderedFloat(a.1).cmp(&OrderedFloat(b.1)).then(a.0.cmp(&b.0)));
            expected.truncate(10);

            let actual: Vec<u64> = index
                .nearest(point, 1500.0, 10)
                .iter()
                .map(|r| r.station.id)
                .collect();
            assert_eq!(actual, expected.iter().map(|(id, _)| *id).collect::<Vec<_>>());
        }
    }
}
