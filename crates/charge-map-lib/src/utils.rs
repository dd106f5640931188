//! Utility functions for coordinate conversions
//!
//! The cluster index works in unit Web Mercator space: the whole world maps onto
//! `[0, 1] × [0, 1]`, with x growing eastwards and y growing southwards.

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Convert a longitude in degrees to unit Mercator x
#[inline(always)]
pub fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Convert a latitude in degrees to unit Mercator y, clamped to `[0, 1]`
#[inline(always)]
pub fn lat_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / std::f64::consts::PI;
    y.clamp(0.0, 1.0)
}

/// Convert unit Mercator x back to longitude in degrees
#[inline(always)]
pub fn x_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Convert unit Mercator y back to latitude in degrees
#[inline(always)]
pub fn y_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0).to_radians();
    360.0 * y2.exp().atan() / std::f64::consts::PI - 90.0
}

/// Wrap a longitude into `[-180, 180)`
#[inline(always)]
pub fn wrap_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin() {
        assert!((lng_x(0.0) - 0.5).abs() < 1e-12);
        assert!((lat_y(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_bounds() {
        assert!(lng_x(-180.0).abs() < 1e-12);
        assert!((lng_x(180.0) - 1.0).abs() < 1e-12);

        // Poles clamp onto the edges of the unit square
        assert_eq!(lat_y(90.0), 0.0);
        assert_eq!(lat_y(-90.0), 1.0);
        assert!(lat_y(MAX_LATITUDE) < 1e-6);
    }

    #[test]
    fn test_y_grows_southwards() {
        assert!(lat_y(37.78) < lat_y(37.77));
    }

    #[test]
    fn test_roundtrip() {
        let lat = 37.7749;
        let lng = -122.4194;

        let lat2 = y_lat(lat_y(lat));
        let lng2 = x_lng(lng_x(lng));

        assert!((lat - lat2).abs() < 1e-9);
        assert!((lng - lng2).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_lng() {
        assert!((wrap_lng(190.0) - -170.0).abs() < 1e-9);
        assert!((wrap_lng(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_lng(-180.0) - -180.0).abs() < 1e-9);
        assert!((wrap_lng(180.0) - -180.0).abs() < 1e-9);
        assert!((wrap_lng(45.0) - 45.0).abs() < 1e-9);
    }
}
