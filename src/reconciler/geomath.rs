//! Great-circle distance

use geo::geometry::Point;

/// Mean Earth radius, in feet
const EARTH_RADIUS_FEET: f64 = 20_902_231.0;

/// Haversine distance between two WGS84 points, in feet
///
/// NaN coordinates propagate into the result; validating them is the
/// caller's job.
pub fn distance_feet(a: Point, b: Point) -> f64 {
    let lat_a = a.y().to_radians();
    let lat_b = b.y().to_radians();
    let dlat = (b.y() - a.y()).to_radians();
    let dlng = (b.x() - a.x()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_FEET * c
}

#[cfg(test)]
mod tests {
    use geo::geometry::Point;

    use super::distance_feet;

    // one degree of latitude on this sphere
    const FEET_PER_LAT_DEGREE: f64 = 364_812.0;

    #[test]
    fn same_point() {
        let p = Point::new(-79.0, 36.0);

        assert_eq!(0.0, distance_feet(p, p));
    }

    #[test]
    fn one_latitude_degree() {
        let a = Point::new(-79.0, 36.0);
        let b = Point::new(-79.0, 37.0);

        let d = distance_feet(a, b);
        assert!((d - FEET_PER_LAT_DEGREE).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn symmetric() {
        let a = Point::new(-48.8702222, -26.31832);
        let b = Point::new(-48.8619776, -26.3185919);

        assert_eq!(distance_feet(a, b), distance_feet(b, a));
    }

    #[test]
    fn small_offset() {
        let a = Point::new(-79.0, 36.0);
        let b = Point::new(-79.0, 36.001);

        let d = distance_feet(a, b);
        assert!((d - 364.8).abs() < 1.0, "got {}", d);
    }
}
