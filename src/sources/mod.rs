//! Record sources API

use serde::Deserialize;
use time::OffsetDateTime;

use crate::reconciler::position::{GpsPoint, PunchEvent, ScheduledVisit, StationarySegment};

/// A dwell segment and the technician it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicianSegment {
    pub technician: String,
    pub segment: StationarySegment,
}

/// A raw position sample and the technician it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicianPosition {
    pub technician: String,
    pub position: GpsPoint,
}

/// A time-clock punch and the technician it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicianPunch {
    pub technician: String,
    pub punch: PunchEvent,
}

/// A scheduled visit and the technician it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicianVisit {
    pub technician: String,
    pub visit: ScheduledVisit,
}

/// Dwell-segment telemetry source
pub trait SegmentsSource {
    /// Fetch the segments starting during the period
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianSegment>, String>;
}

/// Raw position track source
pub trait TrackSource {
    /// Fetch the position samples recorded during the period
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianPosition>, String>;
}

/// Payroll time-clock source
pub trait PunchSource {
    /// Fetch the punches recorded during the period
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianPunch>, String>;
}

/// Schedule/appointment source
pub trait VisitsSource {
    /// Fetch the visits scheduled during the period
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianVisit>, String>;
}

/// Field names of a segments record
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SegmentFields {
    #[serde(default = "default_technician")]
    pub technician: String,
    #[serde(default = "default_start_time")]
    pub start_time: String,
    #[serde(default = "default_end_time")]
    pub end_time: String,
    #[serde(default = "default_start_coordinates")]
    pub start_coordinates: String,
    #[serde(default = "default_end_coordinates")]
    pub end_coordinates: String,
    #[serde(default)]
    pub flip_coordinates: bool,
}

impl Default for SegmentFields {
    fn default() -> Self {
        Self {
            technician: default_technician(),
            start_time: default_start_time(),
            end_time: default_end_time(),
            start_coordinates: default_start_coordinates(),
            end_coordinates: default_end_coordinates(),
            flip_coordinates: false,
        }
    }
}

impl SegmentFields {
    pub fn technician(&mut self, field: &str) -> &mut Self {
        self.technician = field.to_string();

        self
    }

    pub fn start_time(&mut self, field: &str) -> &mut Self {
        self.start_time = field.to_string();

        self
    }

    pub fn end_time(&mut self, field: &str) -> &mut Self {
        self.end_time = field.to_string();

        self
    }

    pub fn start_coordinates(&mut self, field: &str) -> &mut Self {
        self.start_coordinates = field.to_string();

        self
    }

    pub fn end_coordinates(&mut self, field: &str) -> &mut Self {
        self.end_coordinates = field.to_string();

        self
    }

    pub fn done(&self) -> Self {
        self.clone()
    }
}

/// Field names of a raw track record
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TrackFields {
    #[serde(default = "default_technician")]
    pub technician: String,
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default = "default_coordinates")]
    pub coordinates: String,
    #[serde(default)]
    pub flip_coordinates: bool,
}

impl Default for TrackFields {
    fn default() -> Self {
        Self {
            technician: default_technician(),
            time: default_time(),
            coordinates: default_coordinates(),
            flip_coordinates: false,
        }
    }
}

/// Field names of a punch record
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PunchFields {
    #[serde(default = "default_technician")]
    pub technician: String,
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default = "default_kind")]
    pub kind: String,
}

impl Default for PunchFields {
    fn default() -> Self {
        Self {
            technician: default_technician(),
            time: default_time(),
            kind: default_kind(),
        }
    }
}

/// Field names of a scheduled visit record
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VisitFields {
    #[serde(default = "default_technician")]
    pub technician: String,
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default = "default_coordinates")]
    pub coordinates: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub flip_coordinates: bool,
}

impl Default for VisitFields {
    fn default() -> Self {
        Self {
            technician: default_technician(),
            time: default_time(),
            coordinates: default_coordinates(),
            name: default_name(),
            flip_coordinates: false,
        }
    }
}

/// Field mappings of every record shape
#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
pub struct SourceFields {
    #[serde(default)]
    pub segments: SegmentFields,
    #[serde(default)]
    pub track: TrackFields,
    #[serde(default)]
    pub punches: PunchFields,
    #[serde(default)]
    pub visits: VisitFields,
}

fn default_technician() -> String {
    "technician".to_string()
}

fn default_time() -> String {
    "time".to_string()
}

fn default_start_time() -> String {
    "start_time".to_string()
}

fn default_end_time() -> String {
    "end_time".to_string()
}

fn default_coordinates() -> String {
    "coordinates".to_string()
}

fn default_start_coordinates() -> String {
    "start_coordinates".to_string()
}

fn default_end_coordinates() -> String {
    "end_coordinates".to_string()
}

fn default_kind() -> String {
    "kind".to_string()
}

fn default_name() -> String {
    "name".to_string()
}

#[cfg(feature = "csv")]
mod csv_file;

#[cfg(feature = "csv")]
pub use csv_file::{CsvPunchSource, CsvSegmentsSource, CsvTrackSource, CsvVisitsSource};

mod gpx_file;

pub use gpx_file::GpxSource;

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "mongo")]
pub use mongo::MongoDbSource;
