/// Great-circle distance between coordinates.
use crate::model::Coordinate;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometres. Unrounded.
///
/// Inputs are not validated; out-of-range or non-finite coordinates give meaningless
/// (possibly NaN) results.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Round to one decimal place, halves away from zero.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOGOTA: Coordinate = Coordinate::new(4.6097, -74.0817);

    fn samples() -> Vec<Coordinate> {
        vec![
            BOGOTA,
            Coordinate::new(6.2442, -75.5812),  // Medellín
            Coordinate::new(3.4516, -76.5320),  // Cali
            Coordinate::new(10.3910, -75.4794), // Cartagena
            Coordinate::new(-33.8688, 151.2093),
            Coordinate::new(0.0, 179.9),
            Coordinate::new(0.0, -179.9),
        ]
    }

    #[test]
    fn distance_to_self_is_zero() {
        for c in samples() {
            assert_eq!(distance_km(c, c), 0.0);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let points = samples();
        for a in &points {
            for b in &points {
                let ab = distance_km(*a, *b);
                let ba = distance_km(*b, *a);
                assert!((ab - ba).abs() < 1e-9, "{a:?} {b:?}: {ab} vs {ba}");
                assert!(ab >= 0.0);
            }
        }
    }

    #[test]
    fn one_kilometre_north_of_bogota() {
        // 1 km of arc along a meridian is 1 / (R * pi / 180) degrees.
        let one_km_deg = 1.0 / (EARTH_RADIUS_KM * std::f64::consts::PI / 180.0);
        let north = Coordinate::new(BOGOTA.latitude + one_km_deg, BOGOTA.longitude);
        let d = distance_km(BOGOTA, north);
        assert!((d - 1.0).abs() < 0.05, "got {d}");
    }

    #[test]
    fn known_city_distance() {
        // Bogotá to Medellín is roughly 246 km as the crow flies.
        let d = distance_km(BOGOTA, Coordinate::new(6.2442, -75.5812));
        assert!((d - 246.1).abs() < 1.0, "got {d}");
    }

    #[test]
    fn antimeridian_points_are_close() {
        let d = distance_km(Coordinate::new(0.0, 179.9), Coordinate::new(0.0, -179.9));
        assert!(d < 25.0, "got {d}");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to_tenth(3.25), 3.3);
        assert_eq!(round_to_tenth(3.24), 3.2);
        assert_eq!(round_to_tenth(0.05), 0.1);
        assert_eq!(round_to_tenth(7.0), 7.0);
    }
}
