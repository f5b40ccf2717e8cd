//! Geographic utilities shared by the filter and monitor modules.

use geo::{Distance, Haversine, Point};

use crate::GpsFix;

/// Great-circle distance between two coordinate pairs in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine::distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Great-circle distance between two fixes in meters.
pub fn fix_distance(a: &GpsFix, b: &GpsFix) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_zero_distance() {
        assert_eq!(haversine_distance(52.5, 13.4, 52.5, 13.4), 0.0);
    }

    #[test]
    fn test_known_distance() {
        // One degree of latitude is ~111.2 km.
        let d = haversine_distance(52.0, 13.4, 53.0, 13.4);
        assert!(d > 110_000.0 && d < 112_500.0, "got {}", d);
    }

    #[test]
    fn test_small_offset_is_meters_scale() {
        // 0.0001 deg latitude is ~11 m.
        let d = haversine_distance(52.5, 13.4, 52.5001, 13.4);
        assert!(d > 10.0 && d < 12.5, "got {}", d);
    }

    #[test]
    fn test_fix_distance_matches_raw_coordinates() {
        let now = Utc::now();
        let a = GpsFix::new(52.5, 13.4, now);
        let b = GpsFix::new(52.6, 13.5, now);
        let expected = haversine_distance(52.5, 13.4, 52.6, 13.5);
        assert_eq!(fix_distance(&a, &b), expected);
    }
}
