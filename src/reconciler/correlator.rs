//! Time to place correlation over dwell segments

use geo::geometry::Point;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::position::StationarySegment;

/// Window beyond which the nearest stop is no longer trusted, in minutes
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 15;

/// Cap applied to open-ended dwells, for the containment test only
const OPEN_DWELL_CAP: Duration = Duration::hours(24);

/// Resolve where a technician was at one instant
///
/// Telemetry only reports stops, so an instant inside a dwell resolves
/// directly, and an instant between dwells falls back to the nearest dwell
/// boundary within `tolerance`. Beyond the tolerance the inference is no
/// longer trustworthy and the answer is `None`, never a guess. Segments
/// are scanned independently; no input ordering is assumed.
pub fn locate(
    segments: &[StationarySegment],
    target: OffsetDateTime,
    tolerance: Duration,
) -> Option<Point> {
    // instant inside a dwell
    for seg in segments {
        let end = seg.end_time.unwrap_or(seg.start_time + OPEN_DWELL_CAP);
        if seg.start_time <= target && target <= end {
            let elapsed = target - seg.start_time;
            // second half of the dwell: the vehicle is about to leave
            let place = if elapsed > (end - seg.start_time) / 2 {
                seg.end_coordinates.unwrap_or(seg.start_coordinates)
            } else {
                seg.start_coordinates
            };

            debug!(instant = %target, dwell_start = %seg.start_time, "located inside dwell");
            return Some(place);
        }
    }

    // between stops: the nearest boundary is the best evidence available
    let mut best: Option<(Duration, OffsetDateTime, Point)> = None;
    for seg in segments {
        consider(&mut best, seg.start_time, seg.start_coordinates, target);
        if let (Some(time), Some(place)) = (seg.end_time, seg.end_coordinates) {
            consider(&mut best, time, place, target);
        }
    }

    match best {
        Some((gap, boundary, place)) if gap <= tolerance => {
            debug!(instant = %target, boundary = %boundary, gap_seconds = gap.whole_seconds(), "located at nearest dwell boundary");
            Some(place)
        }
        _ => None,
    }
}

/// Keep the boundary strictly nearest to the target, earlier instant on ties
fn consider(
    best: &mut Option<(Duration, OffsetDateTime, Point)>,
    instant: OffsetDateTime,
    place: Point,
    target: OffsetDateTime,
) {
    let gap = (target - instant).abs();

    let better = match best {
        None => true,
        Some((best_gap, best_instant, _)) => {
            gap < *best_gap || (gap == *best_gap && instant < *best_instant)
        }
    };

    if better {
        *best = Some((gap, instant, place));
    }
}
