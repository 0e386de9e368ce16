use serde::Serialize;

use super::sample::SampleSequence;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Position of the directional marker along the path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerPosition {
    pub point: GeoPoint,
    /// Degrees clockwise from north.
    pub heading: f64,
}

/// Great-circle distance in metres.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `a` towards `b`.
pub fn initial_bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Polyline over a sample sequence with cumulative distances.
#[derive(Debug, Clone)]
pub struct PathGeometry {
    points: Vec<GeoPoint>,
    headings: Vec<f64>,
    cumulative_m: Vec<f64>,
}

impl PathGeometry {
    pub fn new(samples: &SampleSequence) -> Self {
        let points: Vec<GeoPoint> = samples
            .iter()
            .map(|s| GeoPoint {
                latitude: s.latitude,
                longitude: s.longitude,
            })
            .collect();
        let headings = samples.iter().map(|s| s.bearing).collect();

        let mut cumulative_m = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                total += haversine_m(points[i - 1], *point);
            }
            cumulative_m.push(total);
        }

        Self {
            points,
            headings,
            cumulative_m,
        }
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn total_length_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    /// First and last sample positions (start/end markers).
    pub fn endpoints(&self) -> Option<(GeoPoint, GeoPoint)> {
        Some((*self.points.first()?, *self.points.last()?))
    }

    /// Marker at `fraction` (clamped to `[0, 1]`) of the path length.
    pub fn position_at(&self, fraction: f64) -> Option<MarkerPosition> {
        let first = *self.points.first()?;
        let total = self.total_length_m();
        if self.points.len() == 1 || total <= 0.0 {
            return Some(MarkerPosition {
                point: first,
                heading: self.headings[0],
            });
        }

        let target = fraction.clamp(0.0, 1.0) * total;
        // index of the first vertex at or beyond the target distance
        let upper = self
            .cumulative_m
            .partition_point(|&d| d < target)
            .clamp(1, self.points.len() - 1);
        let lower = upper - 1;

        let a = self.points[lower];
        let b = self.points[upper];
        let segment = self.cumulative_m[upper] - self.cumulative_m[lower];
        let t = if segment > 0.0 {
            (target - self.cumulative_m[lower]) / segment
        } else {
            0.0
        };

        let heading = if segment > 0.0 {
            initial_bearing(a, b)
        } else {
            self.headings[lower]
        };

        Some(MarkerPosition {
            point: GeoPoint {
                latitude: a.latitude + (b.latitude - a.latitude) * t,
                longitude: a.longitude + (b.longitude - a.longitude) * t,
            },
            heading,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Sample;
    use chrono::{Duration, TimeZone, Utc};

    fn sequence(coords: &[(f64, f64)]) -> SampleSequence {
        let base = Utc.with_ymd_and_hms(2025, 3, 18, 10, 0, 0).unwrap();
        let samples = coords
            .iter()
            .enumerate()
            .map(|(i, &(latitude, longitude))| Sample {
                id: i.to_string(),
                device_id: "d".into(),
                latitude,
                longitude,
                altitude: 0.0,
                bearing: 10.0,
                timestamp: base + Duration::seconds(i as i64),
                speed: None,
                fuel_level: None,
                ignition: None,
            })
            .collect();
        SampleSequence::new("d", base, base + Duration::hours(1), samples)
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_m(
            GeoPoint {
                latitude: 0.0,
                longitude: 0.0,
            },
            GeoPoint {
                latitude: 1.0,
                longitude: 0.0,
            },
        );
        assert!((d - 111_195.0).abs() < 50.0, "got {}", d);
    }

    #[test]
    fn test_position_at_ends_and_middle() {
        let path = PathGeometry::new(&sequence(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)]));

        let start = path.position_at(0.0).unwrap();
        assert_eq!(start.point, path.points()[0]);

        let end = path.position_at(1.0).unwrap();
        assert!((end.point.longitude - 2.0).abs() < 1e-9);

        let mid = path.position_at(0.5).unwrap();
        assert!((mid.point.longitude - 1.0).abs() < 1e-6);
        assert!((mid.heading - 90.0).abs() < 1e-6);

        let quarter = path.position_at(0.25).unwrap();
        assert!((quarter.point.longitude - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_point_path() {
        let path = PathGeometry::new(&sequence(&[(12.0, 77.0)]));
        assert_eq!(path.total_length_m(), 0.0);
        let marker = path.position_at(0.7).unwrap();
        assert_eq!(marker.heading, 10.0);
        let (a, b) = path.endpoints().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_path() {
        let path = PathGeometry::new(&sequence(&[]));
        assert!(path.position_at(0.5).is_none());
        assert!(path.endpoints().is_none());
    }
}
