//! GPX file source integration

use std::io::Read;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{TechnicianPosition, TrackSource};
use crate::reconciler::position::GpsPoint;

/// A technician's drive track from a GPX export
///
/// The whole document is read up front; untimed waypoints are useless
/// for correlation and are dropped.
pub struct GpxSource {
    technician: String,
    points: Vec<GpsPoint>,
}

impl GpxSource {
    pub fn read<T>(reader: T, technician: &str) -> Result<Self, String>
    where
        T: Read,
    {
        let doc = gpx::read(reader).map_err(|e| format!("Failed on read the GPX document: {}", e))?;

        let mut points = vec![];
        for track in doc.tracks {
            for segment in track.segments {
                for wp in segment.points {
                    if let Some(time) = wp.time {
                        let time = time
                            .format()
                            .map_err(|e| format!("Failed on read the GPX time: {}", e))?;
                        let time = OffsetDateTime::parse(&time, &Rfc3339)
                            .map_err(|e| format!("Failed on parse the GPX time: {}", e))?;
                        points.push(GpsPoint::basic(wp.point(), time));
                    }
                }
            }
        }

        Ok(Self {
            technician: technician.to_string(),
            points,
        })
    }
}

impl TrackSource for GpxSource {
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianPosition>, String> {
        Ok(self
            .points
            .iter()
            .filter(|p| start <= p.time && p.time <= end)
            .map(|p| TechnicianPosition {
                technician: self.technician.clone(),
                position: *p,
            })
            .collect())
    }
}

#[cfg(test)]
pub mod tests {
    use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
    use geo::geometry::Point;
    use time::macros::datetime;

    use super::super::TrackSource;
    use super::GpxSource;

    fn document() -> Result<Vec<u8>, String> {
        let mut segment = TrackSegment::new();

        let mut timed = Waypoint::new(Point::new(-48.8702222, -26.31832));
        timed.time = Some(datetime!(2023-03-06 8:00 UTC).into());
        segment.points.push(timed);

        let mut late = Waypoint::new(Point::new(-48.8802222, -26.31832));
        late.time = Some(datetime!(2023-03-07 8:00 UTC).into());
        segment.points.push(late);

        // no time, never usable
        segment.points.push(Waypoint::new(Point::new(-48.9, -26.3)));

        let mut track = Track::new();
        track.segments.push(segment);

        let mut doc: Gpx = Default::default();
        doc.version = GpxVersion::Gpx11;
        doc.tracks.push(track);

        let mut buffer = vec![];
        gpx::write(&doc, &mut buffer).map_err(|e| e.to_string())?;

        Ok(buffer)
    }

    #[test]
    fn track() -> Result<(), String> {
        let doc = document()?;

        let mut source = GpxSource::read(doc.as_slice(), "T9")?;

        let positions = source.fetch(
            datetime!(2023-03-06 0:00 UTC),
            datetime!(2023-03-06 23:00 UTC),
        )?;
        assert_eq!(1, positions.len());
        assert_eq!("T9", positions[0].technician);
        assert_eq!(
            Point::new(-48.8702222, -26.31832),
            positions[0].position.coordinates
        );
        assert_eq!(datetime!(2023-03-06 8:00 UTC), positions[0].position.time);

        Ok(())
    }

    #[test]
    fn track_unfiltered() -> Result<(), String> {
        let doc = document()?;

        let mut source = GpxSource::read(doc.as_slice(), "T9")?;

        let positions = source.fetch(
            datetime!(2023-03-01 0:00 UTC),
            datetime!(2023-03-31 0:00 UTC),
        )?;
        // the untimed waypoint is dropped on read
        assert_eq!(2, positions.len());

        Ok(())
    }
}
