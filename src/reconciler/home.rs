//! Home location inference from recurring first-of-day positions

use geo::geometry::Point;
use serde::Serialize;
use time::Date;

use super::geomath::distance_feet;

/// Radius binding a day's first position to a cluster, in feet
pub const DEFAULT_CLUSTER_RADIUS_FEET: f64 = 500.0;

/// Fewest analyzable days worth suggesting a home from
pub const DEFAULT_MIN_DAYS: usize = 5;

const HIGH_CONFIDENCE_FRACTION: f64 = 0.7;
const MEDIUM_CONFIDENCE_FRACTION: f64 = 0.4;

/// First recorded position of one workday
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyFirstPosition {
    pub date: Date,
    pub coordinates: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Likely home coordinate inferred from where workdays keep starting
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HomeSuggestion {
    pub lat: f64,
    pub lng: f64,
    pub confidence: Confidence,
    pub days_detected: usize,
    pub total_days_analyzed: usize,
}

impl HomeSuggestion {
    pub fn coordinates(&self) -> Point {
        Point::new(self.lng, self.lat)
    }
}

struct Cluster {
    anchor: Point,
    days: usize,
}

/// Infer a likely home from many days of first positions
///
/// Greedy single pass in day order: the earliest day starting a cluster
/// stays its anchor, and a later day joins the first cluster whose anchor
/// is within `cluster_radius_feet`. The largest cluster must be a strict
/// plurality; too few days or a tie means there is not enough signal and
/// the answer is `None`. The suggested coordinate is the anchor itself.
pub fn detect_home(
    samples: &[DailyFirstPosition],
    cluster_radius_feet: f64,
    min_days: usize,
) -> Option<HomeSuggestion> {
    if samples.len() < min_days {
        return None;
    }

    let mut samples: Vec<&DailyFirstPosition> = samples.iter().collect();
    samples.sort_by_key(|s| s.date);

    let mut clusters: Vec<Cluster> = vec![];
    for sample in &samples {
        let joined = clusters
            .iter_mut()
            .find(|c| distance_feet(sample.coordinates, c.anchor) <= cluster_radius_feet);

        match joined {
            Some(cluster) => cluster.days += 1,
            None => clusters.push(Cluster {
                anchor: sample.coordinates,
                days: 1,
            }),
        }
    }

    let best = clusters.iter().max_by_key(|c| c.days)?;
    if clusters.iter().filter(|c| c.days == best.days).count() > 1 {
        // a tie for the largest cluster is not a home signal
        return None;
    }

    let total = samples.len();
    let fraction = best.days as f64 / total as f64;
    let confidence = if fraction >= HIGH_CONFIDENCE_FRACTION {
        Confidence::High
    } else if fraction >= MEDIUM_CONFIDENCE_FRACTION {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    Some(HomeSuggestion {
        lat: best.anchor.y(),
        lng: best.anchor.x(),
        confidence,
        days_detected: best.days,
        total_days_analyzed: total,
    })
}

#[cfg(test)]
mod tests {
    use geo::geometry::Point;
    use time::macros::date;
    use time::Date;

    use super::{detect_home, Confidence, DailyFirstPosition, DEFAULT_CLUSTER_RADIUS_FEET};

    // ~400 feet of latitude, inside the default cluster radius
    const LAT_NEARBY: f64 = 0.0011;

    fn sample(date: Date, lng: f64, lat: f64) -> DailyFirstPosition {
        DailyFirstPosition {
            date,
            coordinates: Point::new(lng, lat),
        }
    }

    fn ten_days_mostly_home() -> Vec<DailyFirstPosition> {
        let mut samples = vec![];

        // eight mornings around the same driveway
        for day in 1..=8 {
            let wobble = if day % 2 == 0 { LAT_NEARBY } else { 0.0 };
            samples.push(sample(
                Date::from_calendar_date(2023, time::Month::March, day).unwrap(),
                -79.05,
                36.05 + wobble,
            ));
        }
        // two mornings somewhere else entirely
        samples.push(sample(date!(2023 - 03 - 09), -79.5, 36.5));
        samples.push(sample(date!(2023 - 03 - 10), -79.5, 36.5));

        samples
    }

    #[test]
    fn suggests_the_recurring_cluster() {
        let suggestion =
            detect_home(&ten_days_mostly_home(), DEFAULT_CLUSTER_RADIUS_FEET, 5).expect("suggestion");

        // anchored on the earliest day's position
        assert_eq!(36.05, suggestion.lat);
        assert_eq!(-79.05, suggestion.lng);
        assert_eq!(8, suggestion.days_detected);
        assert_eq!(10, suggestion.total_days_analyzed);
        assert_eq!(Confidence::High, suggestion.confidence);
    }

    #[test]
    fn deterministic_across_runs() {
        let samples = ten_days_mostly_home();

        let first = detect_home(&samples, DEFAULT_CLUSTER_RADIUS_FEET, 5);
        let second = detect_home(&samples, DEFAULT_CLUSTER_RADIUS_FEET, 5);

        assert_eq!(first, second);
    }

    #[test]
    fn unsorted_samples_keep_the_earliest_anchor() {
        let mut samples = ten_days_mostly_home();
        samples.reverse();

        let suggestion =
            detect_home(&samples, DEFAULT_CLUSTER_RADIUS_FEET, 5).expect("suggestion");
        assert_eq!(36.05, suggestion.lat);
    }

    #[test]
    fn lowering_min_days_never_drops_a_confident_result() {
        let samples = ten_days_mostly_home();

        let with_default = detect_home(&samples, DEFAULT_CLUSTER_RADIUS_FEET, 5);
        let with_lower = detect_home(&samples, DEFAULT_CLUSTER_RADIUS_FEET, 2);

        assert!(with_default.is_some());
        assert_eq!(with_default, with_lower);
    }

    #[test]
    fn too_few_days_is_no_signal() {
        let samples = &ten_days_mostly_home()[..4];

        assert_eq!(None, detect_home(samples, DEFAULT_CLUSTER_RADIUS_FEET, 5));
    }

    #[test]
    fn largest_cluster_tie_is_no_signal() {
        let samples = vec![
            sample(date!(2023 - 03 - 01), -79.05, 36.05),
            sample(date!(2023 - 03 - 02), -79.05, 36.05),
            sample(date!(2023 - 03 - 03), -79.5, 36.5),
            sample(date!(2023 - 03 - 04), -79.5, 36.5),
        ];

        assert_eq!(None, detect_home(&samples, DEFAULT_CLUSTER_RADIUS_FEET, 4));
    }

    #[test]
    fn medium_confidence_band() {
        let mut samples = vec![];
        for day in 1..=5 {
            samples.push(sample(
                Date::from_calendar_date(2023, time::Month::March, day).unwrap(),
                -79.05,
                36.05,
            ));
        }
        for (day, lng) in [(6, -79.2), (7, -79.3), (8, -79.4), (9, -79.5), (10, -79.6)] {
            samples.push(sample(
                Date::from_calendar_date(2023, time::Month::March, day).unwrap(),
                lng,
                36.5,
            ));
        }

        let suggestion =
            detect_home(&samples, DEFAULT_CLUSTER_RADIUS_FEET, 5).expect("suggestion");
        assert_eq!(5, suggestion.days_detected);
        assert_eq!(Confidence::Medium, suggestion.confidence);
    }
}
