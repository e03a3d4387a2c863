//! Positional and temporal record definitions

use geo::geometry::Point;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single timestamped position sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub coordinates: Point,
    pub time: OffsetDateTime,
}

impl GpsPoint {
    pub fn basic(coordinates: Point, time: OffsetDateTime) -> Self {
        Self { coordinates, time }
    }
}

/// One continuous dwell of a vehicle between two drives
///
/// A missing end means the vehicle was still there, or that this is the
/// last record the telemetry provider had.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationarySegment {
    pub start_coordinates: Point,
    pub start_time: OffsetDateTime,
    pub end_coordinates: Option<Point>,
    pub end_time: Option<OffsetDateTime>,
}

impl StationarySegment {
    /// Dwell without a recorded departure
    pub fn open(start_coordinates: Point, start_time: OffsetDateTime) -> Self {
        Self {
            start_coordinates,
            start_time,
            end_coordinates: None,
            end_time: None,
        }
    }

    /// Dwell with a recorded departure
    pub fn closed(
        start_coordinates: Point,
        start_time: OffsetDateTime,
        end_coordinates: Point,
        end_time: OffsetDateTime,
    ) -> Self {
        Self {
            start_coordinates,
            start_time,
            end_coordinates: Some(end_coordinates),
            end_time: Some(end_time),
        }
    }
}

/// A scheduled job or appointment
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledVisit {
    pub destination: Point,
    pub time: OffsetDateTime,
    /// Job site name, number...
    pub name: Option<String>,
}

impl ScheduledVisit {
    pub fn basic(destination: Point, time: OffsetDateTime) -> Self {
        Self {
            destination,
            time,
            name: None,
        }
    }
}

/// Direction of a time-clock punch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunchKind {
    ClockIn,
    ClockOut,
}

/// A time-clock punch of one technician-day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PunchEvent {
    pub kind: PunchKind,
    pub time: OffsetDateTime,
}

impl PunchEvent {
    pub fn basic(kind: PunchKind, time: OffsetDateTime) -> Self {
        Self { kind, time }
    }
}
