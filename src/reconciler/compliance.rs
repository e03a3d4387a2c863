//! Punch policy decision tables

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::arrival::variance_minutes;
use super::geofence::{LatLng, LocationType};

/// Minutes a clock-out may trail the last job departure
pub const DEFAULT_CLOCK_OUT_GRACE_MINUTES: i64 = 5;

/// Per-technician policy, owned by an operator and read-only here
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TechnicianPolicy {
    /// The technician's expected punch location is the job site or home,
    /// not the office
    #[serde(default)]
    pub takes_truck_home: bool,
    /// Known home coordinate, when the operator has one on file
    #[serde(default)]
    pub home: Option<LatLng>,
    /// Operator-granted exception for office stops
    #[serde(default)]
    pub office_visit_excused: bool,
}

/// Outcome of one compliance check, a pure computed value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub is_violation: bool,
    pub reason: Option<String>,
    pub expected_location: Option<LocationType>,
    pub actual_location: Option<LocationType>,
    pub can_be_excused: bool,
    pub variance_minutes: Option<i64>,
}

impl Violation {
    pub fn compliant() -> Self {
        Self {
            is_violation: false,
            reason: None,
            expected_location: None,
            actual_location: None,
            can_be_excused: false,
            variance_minutes: None,
        }
    }

    fn flagged(
        reason: String,
        expected: Option<LocationType>,
        actual: Option<LocationType>,
        can_be_excused: bool,
    ) -> Self {
        Self {
            is_violation: true,
            reason: Some(reason),
            expected_location: expected,
            actual_location: actual,
            can_be_excused,
            variance_minutes: None,
        }
    }
}

impl TechnicianPolicy {
    /// Judge a clock-in against its classified location
    ///
    /// Missing GPS evidence never flags: a violation has employment
    /// consequences, so a false negative beats a false accusation.
    pub fn evaluate_clock_in(
        &self,
        location: LocationType,
        excused_office_visit: bool,
    ) -> Violation {
        match location {
            LocationType::Unknown | LocationType::NoGps => Violation::compliant(),
            LocationType::Home if self.takes_truck_home => Violation::flagged(
                "Clocked in at home instead of a job site".to_string(),
                Some(LocationType::Job),
                Some(LocationType::Home),
                false,
            ),
            LocationType::Office if self.takes_truck_home => {
                if excused_office_visit {
                    Violation::compliant()
                } else {
                    Violation::flagged(
                        "Clocked in at the office without an excused visit".to_string(),
                        Some(LocationType::Job),
                        Some(LocationType::Office),
                        true,
                    )
                }
            }
            _ if self.takes_truck_home => Violation::compliant(),
            LocationType::Office => Violation::compliant(),
            other => Violation::flagged(
                "Clocked in away from the office".to_string(),
                Some(LocationType::Office),
                Some(other),
                false,
            ),
        }
    }

    /// Judge a clock-out against its location and the day's last movements
    ///
    /// Closing out at the office is always acceptable, whatever the
    /// policy. Otherwise a truck-home technician must not close out at
    /// home, nor linger more than `grace` past the last job departure.
    pub fn evaluate_clock_out(
        &self,
        punch_time: OffsetDateTime,
        location: LocationType,
        last_stop: LocationType,
        last_job_departure: Option<OffsetDateTime>,
        grace: Duration,
    ) -> Violation {
        if last_stop == LocationType::Office {
            return Violation::compliant();
        }

        if self.takes_truck_home {
            if location == LocationType::Home {
                return Violation::flagged(
                    "Clocked out at home instead of the last job site".to_string(),
                    Some(LocationType::Job),
                    Some(LocationType::Home),
                    false,
                );
            }

            if let Some(departure) = last_job_departure {
                if punch_time - departure > grace {
                    let minutes = variance_minutes(departure, punch_time);
                    let mut violation = Violation::flagged(
                        format!("Clocked out {} minutes after leaving the last job", minutes),
                        Some(LocationType::Job),
                        Some(location),
                        false,
                    );
                    violation.variance_minutes = Some(minutes);
                    return violation;
                }
            }

            return Violation::compliant();
        }

        match location {
            LocationType::Office | LocationType::Unknown | LocationType::NoGps => {
                Violation::compliant()
            }
            other => Violation::flagged(
                "Clocked out away from the office".to_string(),
                Some(LocationType::Office),
                Some(other),
                false,
            ),
        }
    }
}

/// Scheduled work with no clock-in at all
pub fn detect_missing_clock_in(
    has_scheduled_jobs: bool,
    clock_in: Option<OffsetDateTime>,
) -> Violation {
    if has_scheduled_jobs && clock_in.is_none() {
        return Violation::flagged(
            "No clock-in recorded for a day with scheduled jobs".to_string(),
            None,
            None,
            false,
        );
    }

    Violation::compliant()
}

/// A clock-in with no matching clock-out, once the day is over
///
/// An open punch during the day may simply mean the shift is still
/// running, so nothing is flagged until `as_of` reaches `day_end`.
pub fn detect_missing_clock_out(
    clock_in: Option<OffsetDateTime>,
    clock_out: Option<OffsetDateTime>,
    day_end: OffsetDateTime,
    as_of: OffsetDateTime,
) -> Violation {
    if clock_in.is_some() && clock_out.is_none() && as_of >= day_end {
        return Violation::flagged(
            "No clock-out recorded after the day ended".to_string(),
            None,
            None,
            false,
        );
    }

    Violation::compliant()
}
