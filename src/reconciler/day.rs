//! Day reconciliation: fetched records in, structured verdicts out

use std::collections::{BTreeMap, HashMap};

use geo::geometry::Point;
use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Weekday};
use tracing::{debug, info};

use crate::sources::{PunchSource, SegmentsSource, VisitsSource};

use super::arrival::{
    closest_approach, detect_arrival, Approach, Arrival, DEFAULT_ARRIVAL_RADIUS_FEET,
    DEFAULT_PRE_WINDOW_MINUTES,
};
use super::compliance::{
    detect_missing_clock_in, detect_missing_clock_out, TechnicianPolicy, Violation,
    DEFAULT_CLOCK_OUT_GRACE_MINUTES,
};
use super::correlator::{locate, DEFAULT_TOLERANCE_MINUTES};
use super::geofence::{Geofence, GeofenceSet, LatLng, LocationType, DEFAULT_GEOFENCE_RADIUS_FEET};
use super::home::{detect_home, DailyFirstPosition, HomeSuggestion, DEFAULT_CLUSTER_RADIUS_FEET, DEFAULT_MIN_DAYS};
use super::position::{GpsPoint, PunchEvent, PunchKind, ScheduledVisit, StationarySegment};

/// Arrival variance beyond which a visit counts as late, in minutes
pub const DEFAULT_LATE_THRESHOLD_MINUTES: i64 = 10;

/// Evaluation knobs, all with working defaults
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ReconcileOptions {
    #[serde(default = "default_geofence_radius")]
    pub default_geofence_radius_feet: f64,
    #[serde(default = "default_arrival_radius")]
    pub arrival_radius_feet: f64,
    #[serde(default = "default_pre_window")]
    pub arrival_pre_window_minutes: i64,
    #[serde(default = "default_tolerance")]
    pub correlation_tolerance_minutes: i64,
    #[serde(default = "default_grace")]
    pub clock_out_grace_minutes: i64,
    #[serde(default = "default_late_threshold")]
    pub late_threshold_minutes: i64,
    #[serde(default = "default_cluster_radius")]
    pub home_cluster_radius_feet: f64,
    #[serde(default = "default_min_days")]
    pub home_min_days: usize,
}

fn default_geofence_radius() -> f64 {
    DEFAULT_GEOFENCE_RADIUS_FEET
}

fn default_arrival_radius() -> f64 {
    DEFAULT_ARRIVAL_RADIUS_FEET
}

fn default_pre_window() -> i64 {
    DEFAULT_PRE_WINDOW_MINUTES
}

fn default_tolerance() -> i64 {
    DEFAULT_TOLERANCE_MINUTES
}

fn default_grace() -> i64 {
    DEFAULT_CLOCK_OUT_GRACE_MINUTES
}

fn default_late_threshold() -> i64 {
    DEFAULT_LATE_THRESHOLD_MINUTES
}

fn default_cluster_radius() -> f64 {
    DEFAULT_CLUSTER_RADIUS_FEET
}

fn default_min_days() -> usize {
    DEFAULT_MIN_DAYS
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            default_geofence_radius_feet: default_geofence_radius(),
            arrival_radius_feet: default_arrival_radius(),
            arrival_pre_window_minutes: default_pre_window(),
            correlation_tolerance_minutes: default_tolerance(),
            clock_out_grace_minutes: default_grace(),
            late_threshold_minutes: default_late_threshold(),
            home_cluster_radius_feet: default_cluster_radius(),
            home_min_days: default_min_days(),
        }
    }
}

/// One operator-drawn region
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GeofenceConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub radius_feet: Option<f64>,
    /// Polygon vertices from the drawing tool, carried as-is
    #[serde(default)]
    pub boundary: Option<Vec<LatLng>>,
}

impl GeofenceConfig {
    fn fence(&self, fallback_name: &str) -> Geofence {
        let name = self.name.as_deref().unwrap_or(fallback_name);

        let mut fence = Geofence::new(name, Point::new(self.lng, self.lat));
        if let Some(radius) = self.radius_feet {
            fence.radius(radius);
        }
        fence.boundary = self
            .boundary
            .as_ref()
            .map(|vs| vs.iter().map(|v| v.point()).collect());

        fence
    }
}

/// The operator-maintained set of known places
#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
pub struct GeofencesConfig {
    /// Mandatory for punch evaluation
    #[serde(default)]
    pub office: Option<GeofenceConfig>,
    #[serde(default)]
    pub home: Option<GeofenceConfig>,
    #[serde(default)]
    pub custom: Vec<GeofenceConfig>,
}

/// Everything the reconciliation needs besides the records themselves
#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub options: ReconcileOptions,
    #[serde(default)]
    pub geofences: GeofencesConfig,
    #[serde(default)]
    pub technicians: HashMap<String, TechnicianPolicy>,
}

/// Verdict for one recorded punch
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PunchVerdict {
    pub time: OffsetDateTime,
    pub location: LocationType,
    pub verdict: Violation,
}

/// Outcome for one scheduled visit
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisitReport {
    pub name: Option<String>,
    pub scheduled: OffsetDateTime,
    pub arrival: Option<Arrival>,
    pub closest_approach: Option<Approach>,
    /// Only known once an arrival was detected
    pub late: Option<bool>,
}

/// One reconciled technician-day
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DayReport {
    pub technician: String,
    pub date: Date,
    pub clock_in: Option<PunchVerdict>,
    pub clock_out: Option<PunchVerdict>,
    pub missing_clock_in: Violation,
    pub missing_clock_out: Violation,
    pub visits: Vec<VisitReport>,
}

/// Home suggestion of one technician over the analyzed period
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HomeReport {
    pub technician: String,
    pub suggestion: Option<HomeSuggestion>,
}

#[derive(Default)]
struct DayRecords {
    segments: Vec<StationarySegment>,
    punches: Vec<PunchEvent>,
    visits: Vec<ScheduledVisit>,
}

/// Default reconciliation runner over record sources
pub struct DayReconciler {}

impl DayReconciler {
    /// Fetch the three record streams and reconcile every technician-day
    /// of the period
    pub fn build<SS, PS, VS>(
        mut segments: SS,
        mut punches: PS,
        mut visits: VS,
        start: OffsetDateTime,
        end: OffsetDateTime,
        config: &ReconcileConfig,
    ) -> Result<Vec<DayReport>, String>
    where
        SS: SegmentsSource,
        PS: PunchSource,
        VS: VisitsSource,
    {
        let office = config
            .geofences
            .office
            .as_ref()
            .ok_or("Office geofence not configured")?;

        let mut days: BTreeMap<(String, Date), DayRecords> = BTreeMap::new();

        for rec in segments.fetch(start, end)? {
            let key = (rec.technician, rec.segment.start_time.date());
            days.entry(key).or_default().segments.push(rec.segment);
        }
        for rec in punches.fetch(start, end)? {
            let key = (rec.technician, rec.punch.time.date());
            days.entry(key).or_default().punches.push(rec.punch);
        }
        for rec in visits.fetch(start, end)? {
            let key = (rec.technician, rec.visit.time.date());
            days.entry(key).or_default().visits.push(rec.visit);
        }

        let mut reports = vec![];
        for ((technician, date), records) in days {
            let policy = config
                .technicians
                .get(&technician)
                .cloned()
                .unwrap_or_default();
            let fences =
                day_geofences(office, &config.geofences, &policy, &records.visits, &config.options);

            let report = reconcile_day(technician, date, &records, &policy, &fences, &config.options, end);

            info!(
                technician = %report.technician,
                date = %report.date,
                punches = records.punches.len(),
                visits = report.visits.len(),
                "day reconciled"
            );
            reports.push(report);
        }

        Ok(reports)
    }
}

/// Reconcile one technician-day that already has its records in hand
fn reconcile_day(
    technician: String,
    date: Date,
    records: &DayRecords,
    policy: &TechnicianPolicy,
    fences: &GeofenceSet,
    options: &ReconcileOptions,
    as_of: OffsetDateTime,
) -> DayReport {
    let tolerance = Duration::minutes(options.correlation_tolerance_minutes);

    let clock_in = records
        .punches
        .iter()
        .filter(|p| p.kind == PunchKind::ClockIn)
        .min_by_key(|p| p.time);
    let clock_out = records
        .punches
        .iter()
        .filter(|p| p.kind == PunchKind::ClockOut)
        .max_by_key(|p| p.time);

    let punch_location = |time: OffsetDateTime| match locate(&records.segments, time, tolerance) {
        Some(place) => fences.classify(place),
        None => LocationType::NoGps,
    };

    let clock_in_verdict = clock_in.map(|punch| {
        let location = punch_location(punch.time);
        debug!(technician = %technician, location = ?location, "clock-in classified");

        PunchVerdict {
            time: punch.time,
            location,
            verdict: policy.evaluate_clock_in(location, policy.office_visit_excused),
        }
    });

    let clock_out_verdict = clock_out.map(|punch| {
        let location = punch_location(punch.time);
        let last_stop = match last_stop_before(&records.segments, punch.time) {
            Some(place) => fences.classify(place),
            None => LocationType::NoGps,
        };
        let departure = last_job_departure(&records.segments, fences);
        debug!(technician = %technician, location = ?location, last_stop = ?last_stop, "clock-out classified");

        PunchVerdict {
            time: punch.time,
            location,
            verdict: policy.evaluate_clock_out(
                punch.time,
                location,
                last_stop,
                departure,
                Duration::minutes(options.clock_out_grace_minutes),
            ),
        }
    });

    let track = segment_track(&records.segments);
    let visit_reports = visit_arrivals(&track, &records.visits, options);

    let day_end = date
        .next_day()
        .map(|d| d.midnight().assume_utc())
        .unwrap_or(PrimitiveDateTime::MAX.assume_utc());

    DayReport {
        missing_clock_in: detect_missing_clock_in(
            !records.visits.is_empty(),
            clock_in.map(|p| p.time),
        ),
        missing_clock_out: detect_missing_clock_out(
            clock_in.map(|p| p.time),
            clock_out.map(|p| p.time),
            day_end,
            as_of,
        ),
        technician,
        date,
        clock_in: clock_in_verdict,
        clock_out: clock_out_verdict,
        visits: visit_reports,
    }
}

/// Per-visit arrival reports over a raw point track
pub fn visit_arrivals(
    track: &[GpsPoint],
    visits: &[ScheduledVisit],
    options: &ReconcileOptions,
) -> Vec<VisitReport> {
    let mut visits: Vec<&ScheduledVisit> = visits.iter().collect();
    visits.sort_by_key(|v| v.time);

    visits
        .iter()
        .map(|visit| {
            let arrival = detect_arrival(
                visit.time,
                visit.destination,
                track,
                options.arrival_radius_feet,
                Duration::minutes(options.arrival_pre_window_minutes),
            );

            VisitReport {
                name: visit.name.clone(),
                scheduled: visit.time,
                arrival,
                closest_approach: closest_approach(track, visit.destination),
                late: arrival.map(|a| a.variance_minutes > options.late_threshold_minutes),
            }
        })
        .collect()
}

/// Collect each workday's first dwell start and infer likely homes
///
/// Weekend days say little about where a workday starts, so they are
/// dropped here before clustering.
pub fn suggest_home<SS>(
    mut segments: SS,
    start: OffsetDateTime,
    end: OffsetDateTime,
    options: &ReconcileOptions,
) -> Result<Vec<HomeReport>, String>
where
    SS: SegmentsSource,
{
    let mut firsts: BTreeMap<(String, Date), (OffsetDateTime, Point)> = BTreeMap::new();

    for rec in segments.fetch(start, end)? {
        let date = rec.segment.start_time.date();
        if matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday) {
            continue;
        }

        let key = (rec.technician, date);
        let candidate = (rec.segment.start_time, rec.segment.start_coordinates);
        let first = firsts.entry(key).or_insert(candidate);
        if candidate.0 < first.0 {
            *first = candidate;
        }
    }

    let mut samples: BTreeMap<String, Vec<DailyFirstPosition>> = BTreeMap::new();
    for ((technician, date), (_, coordinates)) in firsts {
        samples
            .entry(technician)
            .or_default()
            .push(DailyFirstPosition { date, coordinates });
    }

    let mut reports = vec![];
    for (technician, days) in samples {
        let suggestion = detect_home(&days, options.home_cluster_radius_feet, options.home_min_days);
        debug!(
            technician = %technician,
            days = days.len(),
            suggested = suggestion.is_some(),
            "home analyzed"
        );

        reports.push(HomeReport {
            technician,
            suggestion,
        });
    }

    Ok(reports)
}

/// Build the day's region set: configured places plus the day's job sites
///
/// The technician's own home coordinate wins over the globally
/// configured one. Job sites keep schedule order, so the first-match
/// tie-break stays auditable from the schedule itself.
fn day_geofences(
    office: &GeofenceConfig,
    geofences: &GeofencesConfig,
    policy: &TechnicianPolicy,
    visits: &[ScheduledVisit],
    options: &ReconcileOptions,
) -> GeofenceSet {
    let mut set = GeofenceSet::new(office.fence("office"));
    set.default_radius(options.default_geofence_radius_feet);

    if let Some(home) = &policy.home {
        set.home(Geofence::new("home", home.point()));
    } else if let Some(home) = &geofences.home {
        set.home(home.fence("home"));
    }

    for (i, fence) in geofences.custom.iter().enumerate() {
        set.custom(fence.fence(&format!("custom {}", i + 1)));
    }

    let mut visits: Vec<&ScheduledVisit> = visits.iter().collect();
    visits.sort_by_key(|v| v.time);
    for visit in visits {
        let name = visit.name.as_deref().unwrap_or("job");
        set.job(Geofence::new(name, visit.destination));
    }

    set
}

/// Dwell boundaries as a usable track: these providers only report stops
fn segment_track(segments: &[StationarySegment]) -> Vec<GpsPoint> {
    let mut track = vec![];

    for seg in segments {
        track.push(GpsPoint::basic(seg.start_coordinates, seg.start_time));
        if let (Some(place), Some(time)) = (seg.end_coordinates, seg.end_time) {
            track.push(GpsPoint::basic(place, time));
        }
    }

    track
}

/// The last place the vehicle was known to stop at or before an instant
fn last_stop_before(segments: &[StationarySegment], instant: OffsetDateTime) -> Option<Point> {
    segments
        .iter()
        .filter(|s| s.start_time <= instant)
        .max_by_key(|s| s.start_time)
        .map(|s| s.end_coordinates.unwrap_or(s.start_coordinates))
}

/// When the vehicle left its last job-site dwell, if it ever was at one
fn last_job_departure(
    segments: &[StationarySegment],
    fences: &GeofenceSet,
) -> Option<OffsetDateTime> {
    segments
        .iter()
        .filter(|s| fences.classify(s.start_coordinates) == LocationType::Job)
        .filter_map(|s| s.end_time)
        .max()
}
