//! Scheduled-visit arrival detection

use geo::geometry::Point;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use super::geomath::distance_feet;
use super::position::GpsPoint;

/// Radius around a destination that counts as being there, in feet
pub const DEFAULT_ARRIVAL_RADIUS_FEET: f64 = 300.0;

/// How early before the schedule an arrival may count, in minutes
pub const DEFAULT_PRE_WINDOW_MINUTES: i64 = 30;

/// First detected entry into a destination's radius
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Arrival {
    pub time: OffsetDateTime,
    pub distance_feet: f64,
    /// Signed minutes versus the schedule; positive is late
    pub variance_minutes: i64,
}

/// Nearest a track ever came to a destination
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Approach {
    pub time: OffsetDateTime,
    pub distance_feet: f64,
}

/// Signed schedule variance, rounded to whole minutes
pub fn variance_minutes(scheduled: OffsetDateTime, actual: OffsetDateTime) -> i64 {
    ((actual - scheduled).whole_seconds() as f64 / 60.0).round() as i64
}

/// Find the instant a technician first reached a destination
///
/// First-match policy: the technician arrived the moment the track first
/// enters the radius at or after `scheduled - pre_window`, even if a later
/// sample comes closer. Samples before the window never count, so a prior
/// day's proximity cannot read as an arrival. Whether the variance makes
/// the arrival late is the caller's policy, not this detector's.
pub fn detect_arrival(
    scheduled: OffsetDateTime,
    destination: Point,
    track: &[GpsPoint],
    radius_feet: f64,
    pre_window: Duration,
) -> Option<Arrival> {
    let mut track: Vec<&GpsPoint> = track.iter().collect();
    track.sort_by_key(|p| p.time);

    let window_start = scheduled - pre_window;

    for point in track {
        if point.time < window_start {
            continue;
        }

        let distance = distance_feet(point.coordinates, destination);
        if distance <= radius_feet {
            return Some(Arrival {
                time: point.time,
                distance_feet: distance,
                variance_minutes: variance_minutes(scheduled, point.time),
            });
        }
    }

    None
}

/// Closest approach of a track to a destination, for diagnostics
pub fn closest_approach(track: &[GpsPoint], destination: Point) -> Option<Approach> {
    let mut best: Option<Approach> = None;

    for point in track {
        let distance = distance_feet(point.coordinates, destination);
        if best.map_or(true, |b| distance < b.distance_feet) {
            best = Some(Approach {
                time: point.time,
                distance_feet: distance,
            });
        }
    }

    best
}
