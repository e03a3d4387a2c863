//! Geofence classification

use geo::geometry::Point;
use serde::{Deserialize, Serialize};

use super::geomath::distance_feet;

/// Radius applied to regions without one of their own, in feet
pub const DEFAULT_GEOFENCE_RADIUS_FEET: f64 = 500.0;

/// Kind of place a position resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Office,
    Home,
    Custom,
    Job,
    /// Positioned, but inside no known region
    Unknown,
    /// No usable position at all; classification must never guess here
    NoGps,
}

/// An operator-entered coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn point(&self) -> Point {
        Point::new(self.lng, self.lat)
    }
}

/// A named circular region
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    pub name: String,
    pub center: Point,
    /// Region-specific radius override, in feet
    pub radius_feet: Option<f64>,
    /// Raw polygon vertices from the drawing tool. Kept for callers that
    /// render boundaries; classification applies the circle test only.
    pub boundary: Option<Vec<Point>>,
}

impl Geofence {
    pub fn new(name: &str, center: Point) -> Self {
        Self {
            name: name.to_string(),
            center,
            radius_feet: None,
            boundary: None,
        }
    }

    pub fn radius(&mut self, feet: f64) -> &mut Self {
        self.radius_feet = Some(feet);

        self
    }

    fn contains(&self, point: Point, default_radius_feet: f64) -> bool {
        let radius = self.radius_feet.unwrap_or(default_radius_feet);

        distance_feet(point, self.center) <= radius
    }
}

/// The places a technician-day can resolve to, in classification priority
///
/// Office and home are structurally unambiguous and the most
/// policy-relevant, so they win over any overlapping custom location or
/// job site. Custom locations and job sites match in list order.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceSet {
    pub office: Geofence,
    pub home: Option<Geofence>,
    pub custom: Vec<Geofence>,
    pub jobs: Vec<Geofence>,
    pub default_radius_feet: f64,
}

impl GeofenceSet {
    pub fn new(office: Geofence) -> Self {
        Self {
            office,
            home: None,
            custom: vec![],
            jobs: vec![],
            default_radius_feet: DEFAULT_GEOFENCE_RADIUS_FEET,
        }
    }

    pub fn home(&mut self, fence: Geofence) -> &mut Self {
        self.home = Some(fence);

        self
    }

    pub fn custom(&mut self, fence: Geofence) -> &mut Self {
        self.custom.push(fence);

        self
    }

    pub fn job(&mut self, fence: Geofence) -> &mut Self {
        self.jobs.push(fence);

        self
    }

    pub fn default_radius(&mut self, feet: f64) -> &mut Self {
        self.default_radius_feet = if feet <= 0.0 {
            DEFAULT_GEOFENCE_RADIUS_FEET
        } else {
            feet
        };

        self
    }

    /// Classify a position against every region of the set
    ///
    /// The first region containing the point wins; overlaps are broken by
    /// priority order, never by distance.
    pub fn classify(&self, point: Point) -> LocationType {
        if self.office.contains(point, self.default_radius_feet) {
            return LocationType::Office;
        }

        if let Some(home) = &self.home {
            if home.contains(point, self.default_radius_feet) {
                return LocationType::Home;
            }
        }

        for fence in &self.custom {
            if fence.contains(point, self.default_radius_feet) {
                return LocationType::Custom;
            }
        }

        for fence in &self.jobs {
            if fence.contains(point, self.default_radius_feet) {
                return LocationType::Job;
            }
        }

        LocationType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use geo::geometry::Point;

    use super::{Geofence, GeofenceSet, LocationType};

    // lat degrees for round feet on the test sphere
    const LAT_500_FEET: f64 = 0.00137;
    const LAT_100_FEET: f64 = 0.000274;

    fn office() -> Geofence {
        Geofence::new("office", Point::new(-79.0, 36.0))
    }

    #[test]
    fn inside_office() {
        let set = GeofenceSet::new(office());

        let near = Point::new(-79.0, 36.0 + LAT_100_FEET);
        assert_eq!(LocationType::Office, set.classify(near));
    }

    #[test]
    fn outside_everything() {
        let set = GeofenceSet::new(office());

        let far = Point::new(-79.0, 36.002);
        assert_eq!(LocationType::Unknown, set.classify(far));
    }

    #[test]
    fn office_wins_over_overlapping_custom() {
        let mut set = GeofenceSet::new(office());
        set.custom(Geofence::new("yard", Point::new(-79.0, 36.0 + LAT_100_FEET)));

        // inside both regions
        let point = Point::new(-79.0, 36.0 + LAT_100_FEET / 2.0);
        assert_eq!(LocationType::Office, set.classify(point));
    }

    #[test]
    fn home_wins_over_job() {
        let mut set = GeofenceSet::new(office());
        set.home(Geofence::new("home", Point::new(-79.1, 36.1)));
        set.job(Geofence::new("job 1", Point::new(-79.1, 36.1)));

        assert_eq!(LocationType::Home, set.classify(Point::new(-79.1, 36.1)));
    }

    #[test]
    fn custom_matches_in_list_order() {
        let mut set = GeofenceSet::new(office());
        set.custom(Geofence::new("shop a", Point::new(-79.2, 36.2)));
        set.custom(Geofence::new("shop b", Point::new(-79.2, 36.2)));

        assert_eq!(LocationType::Custom, set.classify(Point::new(-79.2, 36.2)));
    }

    #[test]
    fn radius_override() {
        let mut fence = Geofence::new("small office", Point::new(-79.0, 36.0));
        fence.radius(100.0);
        let set = GeofenceSet::new(fence);

        // inside the default 500ft but outside the 100ft override
        let point = Point::new(-79.0, 36.0 + LAT_500_FEET / 2.0);
        assert_eq!(LocationType::Unknown, set.classify(point));
    }

    #[test]
    fn boundary_vertices_are_carried_but_not_classified() {
        let mut fence = office();
        fence.boundary = Some(vec![
            Point::new(-79.1, 36.1),
            Point::new(-78.9, 36.1),
            Point::new(-79.0, 35.9),
        ]);
        let set = GeofenceSet::new(fence);

        // the circle test still decides, polygon or not
        let far = Point::new(-79.0, 36.05);
        assert_eq!(LocationType::Unknown, set.classify(far));
    }
}
