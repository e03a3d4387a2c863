//! track2verdict - reconcile GPS tracks, schedules and punches into compliance verdicts

pub mod reconciler;
pub mod sources;

pub use reconciler::arrival::{closest_approach, detect_arrival, variance_minutes, Approach, Arrival};
pub use reconciler::compliance::{
    detect_missing_clock_in, detect_missing_clock_out, TechnicianPolicy, Violation,
};
pub use reconciler::correlator::locate;
pub use reconciler::day::{
    suggest_home, visit_arrivals, DayReconciler, DayReport, GeofenceConfig, GeofencesConfig,
    HomeReport, PunchVerdict, ReconcileConfig, ReconcileOptions, VisitReport,
};
pub use reconciler::geofence::{Geofence, GeofenceSet, LatLng, LocationType};
pub use reconciler::geomath::distance_feet;
pub use reconciler::home::{detect_home, Confidence, DailyFirstPosition, HomeSuggestion};
pub use reconciler::position::{GpsPoint, PunchEvent, PunchKind, ScheduledVisit, StationarySegment};
pub use sources::{
    PunchSource, SegmentsSource, SourceFields, TechnicianPunch, TechnicianPosition,
    TechnicianSegment, TechnicianVisit, TrackSource, VisitsSource,
};
