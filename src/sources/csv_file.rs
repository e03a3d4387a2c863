//! CSV file source integrations

use std::io::Read;

use csv::{Reader, StringRecord};
use geo::geometry::Point;
use time::format_description::well_known;
use time::OffsetDateTime;

use super::{
    PunchFields, PunchSource, SegmentFields, SegmentsSource, TechnicianPosition, TechnicianPunch,
    TechnicianSegment, TechnicianVisit, TrackFields, TrackSource, VisitFields, VisitsSource,
};
use crate::reconciler::position::{GpsPoint, PunchEvent, PunchKind, ScheduledVisit, StationarySegment};

/// Dwell segments from a CSV export
pub struct CsvSegmentsSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: SegmentFields,
}

impl<T> CsvSegmentsSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<SegmentFields>) -> Self {
        Self {
            rdr,
            fields: match fields {
                Some(f) => f,
                None => SegmentFields::default(),
            },
        }
    }
}

impl<T> SegmentsSource for CsvSegmentsSource<T>
where
    T: Read,
{
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianSegment>, String> {
        let mut header = self
            .rdr
            .headers()
            .map_err(|e| format!("Failed on read the header: {}", e))?
            .clone();
        header.trim();

        let technician = required_field(&header, &self.fields.technician, "Technician")?;
        let start_time = required_field(&header, &self.fields.start_time, "Start time")?;
        let start_coordinates =
            required_field(&header, &self.fields.start_coordinates, "Start coordinates")?;
        let end_time = field_position(&header, &self.fields.end_time);
        let end_coordinates = field_position(&header, &self.fields.end_coordinates);

        let mut segments = vec![];

        let mut recs = self.rdr.records();
        while let Some(row) = recs.next() {
            let mut rec = row.map_err(|e| format!("Failed on read some row: {}", e))?;
            rec.trim();

            if rec.len() < 3 {
                continue;
            }

            let parsed = match parse_segment_row(
                &rec,
                technician,
                start_time,
                start_coordinates,
                end_time,
                end_coordinates,
                self.fields.flip_coordinates,
            ) {
                Ok(seg) => Ok(seg),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;

            if let Some(seg) = parsed {
                if start <= seg.segment.start_time && seg.segment.start_time <= end {
                    segments.push(seg);
                }
            }
        }

        Ok(segments)
    }
}

fn parse_segment_row(
    row: &StringRecord,
    technician: usize,
    start_time: usize,
    start_coordinates: usize,
    end_time: Option<usize>,
    end_coordinates: Option<usize>,
    flip: bool,
) -> Result<Option<TechnicianSegment>, String> {
    let technician = required_value(row, technician, "Technician")?;

    let start_place = match parse_coordinates(row.get(start_coordinates).unwrap_or(""), flip)? {
        Some(p) => p,
        None => return Ok(None),
    };

    let start_instant = parse_time(&required_value(row, start_time, "Start time")?)?;

    let mut segment = StationarySegment::open(start_place, start_instant);

    if let (Some(itime), Some(icoords)) = (end_time, end_coordinates) {
        let raw_end_time = row.get(itime).unwrap_or("").trim();
        let raw_end_coords = row.get(icoords).unwrap_or("").trim();

        if !raw_end_time.is_empty() && !raw_end_coords.is_empty() {
            if let Some(place) = parse_coordinates(raw_end_coords, flip)? {
                segment = StationarySegment::closed(
                    start_place,
                    start_instant,
                    place,
                    parse_time(raw_end_time)?,
                );
            }
        }
    }

    Ok(Some(TechnicianSegment {
        technician,
        segment,
    }))
}

/// Raw position samples from a CSV export
pub struct CsvTrackSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: TrackFields,
}

impl<T> CsvTrackSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<TrackFields>) -> Self {
        Self {
            rdr,
            fields: match fields {
                Some(f) => f,
                None => TrackFields::default(),
            },
        }
    }
}

impl<T> TrackSource for CsvTrackSource<T>
where
    T: Read,
{
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianPosition>, String> {
        let mut header = self
            .rdr
            .headers()
            .map_err(|e| format!("Failed on read the header: {}", e))?
            .clone();
        header.trim();

        let technician = required_field(&header, &self.fields.technician, "Technician")?;
        let time = required_field(&header, &self.fields.time, "Time")?;
        let coordinates = required_field(&header, &self.fields.coordinates, "Coordinates")?;

        let mut positions = vec![];

        let mut recs = self.rdr.records();
        while let Some(row) = recs.next() {
            let mut rec = row.map_err(|e| format!("Failed on read some row: {}", e))?;
            rec.trim();

            if rec.len() < 3 {
                continue;
            }

            let technician_id = match required_value(&rec, technician, "Technician") {
                Ok(v) => Ok(v),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;

            let place = match parse_coordinates(rec.get(coordinates).unwrap_or(""), self.fields.flip_coordinates)
            {
                Ok(p) => Ok(p),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;
            let place = match place {
                Some(p) => p,
                None => continue,
            };

            let instant = match parse_time(rec.get(time).unwrap_or("")) {
                Ok(t) => Ok(t),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;

            if start <= instant && instant <= end {
                positions.push(TechnicianPosition {
                    technician: technician_id,
                    position: GpsPoint::basic(place, instant),
                });
            }
        }

        Ok(positions)
    }
}

/// Time-clock punches from a CSV export
pub struct CsvPunchSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: PunchFields,
}

impl<T> CsvPunchSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<PunchFields>) -> Self {
        Self {
            rdr,
            fields: match fields {
                Some(f) => f,
                None => PunchFields::default(),
            },
        }
    }
}

impl<T> PunchSource for CsvPunchSource<T>
where
    T: Read,
{
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianPunch>, String> {
        let mut header = self
            .rdr
            .headers()
            .map_err(|e| format!("Failed on read the header: {}", e))?
            .clone();
        header.trim();

        let technician = required_field(&header, &self.fields.technician, "Technician")?;
        let time = required_field(&header, &self.fields.time, "Time")?;
        let kind = required_field(&header, &self.fields.kind, "Kind")?;

        let mut punches = vec![];

        let mut recs = self.rdr.records();
        while let Some(row) = recs.next() {
            let mut rec = row.map_err(|e| format!("Failed on read some row: {}", e))?;
            rec.trim();

            if rec.len() < 3 {
                continue;
            }

            let parsed = match parse_punch_row(&rec, technician, time, kind) {
                Ok(p) => Ok(p),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;

            if start <= parsed.punch.time && parsed.punch.time <= end {
                punches.push(parsed);
            }
        }

        Ok(punches)
    }
}

fn parse_punch_row(
    row: &StringRecord,
    technician: usize,
    time: usize,
    kind: usize,
) -> Result<TechnicianPunch, String> {
    let technician = required_value(row, technician, "Technician")?;
    let instant = parse_time(&required_value(row, time, "Time")?)?;
    let kind = parse_punch_kind(&required_value(row, kind, "Kind")?)?;

    Ok(TechnicianPunch {
        technician,
        punch: PunchEvent::basic(kind, instant),
    })
}

fn parse_punch_kind(raw: &str) -> Result<PunchKind, String> {
    match raw.trim().to_lowercase().as_str() {
        "in" | "clock_in" | "clock-in" | "clockin" => Ok(PunchKind::ClockIn),
        "out" | "clock_out" | "clock-out" | "clockout" => Ok(PunchKind::ClockOut),
        other => Err(format!("Punch kind `{}` not supported", other)),
    }
}

/// Scheduled visits from a CSV export
pub struct CsvVisitsSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: VisitFields,
}

impl<T> CsvVisitsSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<VisitFields>) -> Self {
        Self {
            rdr,
            fields: match fields {
                Some(f) => f,
                None => VisitFields::default(),
            },
        }
    }
}

impl<T> VisitsSource for CsvVisitsSource<T>
where
    T: Read,
{
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianVisit>, String> {
        let mut header = self
            .rdr
            .headers()
            .map_err(|e| format!("Failed on read the header: {}", e))?
            .clone();
        header.trim();

        let technician = required_field(&header, &self.fields.technician, "Technician")?;
        let time = required_field(&header, &self.fields.time, "Time")?;
        let coordinates = required_field(&header, &self.fields.coordinates, "Coordinates")?;
        let name = field_position(&header, &self.fields.name);

        let mut visits = vec![];

        let mut recs = self.rdr.records();
        while let Some(row) = recs.next() {
            let mut rec = row.map_err(|e| format!("Failed on read some row: {}", e))?;
            rec.trim();

            if rec.len() < 3 {
                continue;
            }

            let technician_id = match required_value(&rec, technician, "Technician") {
                Ok(v) => Ok(v),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;

            let place = match parse_coordinates(rec.get(coordinates).unwrap_or(""), self.fields.flip_coordinates)
            {
                Ok(p) => Ok(p),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;
            let place = match place {
                Some(p) => p,
                None => continue,
            };

            let instant = match parse_time(rec.get(time).unwrap_or("")) {
                Ok(t) => Ok(t),
                Err(e) => Err(format!("Error with row {:?}: {}", rec, e)),
            }?;

            if start > instant || instant > end {
                continue;
            }

            let mut visit = ScheduledVisit::basic(place, instant);
            if let Some(iname) = name {
                visit.name = match rec.get(iname) {
                    Some(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
                    _ => None,
                };
            }

            visits.push(TechnicianVisit {
                technician: technician_id,
                visit,
            });
        }

        Ok(visits)
    }
}

fn field_position(header: &StringRecord, field: &str) -> Option<usize> {
    header.iter().position(|h| h.to_lowercase() == field)
}

fn required_field(header: &StringRecord, field: &str, what: &str) -> Result<usize, String> {
    match field_position(header, field) {
        Some(p) => Ok(p),
        None => Err(format!("{} header not found", what)),
    }
}

fn required_value(row: &StringRecord, index: usize, what: &str) -> Result<String, String> {
    match row.get(index) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(format!("{} field not found", what)),
    }
}

fn parse_time(raw: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(raw, &well_known::Rfc3339)
        .map_err(|e| format!("Failed on parse the time: {}", e))
}

fn parse_coordinates(raw: &str, flip: bool) -> Result<Option<Point>, String> {
    let separator = match raw {
        s if s.contains(',') => ",",
        s if s.contains(';') => ";",
        _ => " ",
    };
    let parts: Vec<String> = raw.split(separator).map(|s| s.trim().to_string()).collect();
    if parts.len() != 2 {
        return Ok(None);
    }

    let mut ilat = 1;
    let mut ilng = 0;
    if flip {
        ilat = 0;
        ilng = 1;
    }

    let lat = parts[ilat]
        .parse::<f64>()
        .map_err(|e| format!("Invalid latitude format: {}", e))?;
    let lng = parts[ilng]
        .parse::<f64>()
        .map_err(|e| format!("Invalid longitude format: {}", e))?;

    Ok(Some(Point::new(lng, lat)))
}

#[cfg(test)]
pub mod tests {
    use csv::ReaderBuilder;
    use geo::geometry::Point;
    use time::macros::datetime;

    use super::super::{PunchSource, SegmentsSource, TrackSource, VisitsSource};
    use super::{CsvPunchSource, CsvSegmentsSource, CsvTrackSource, CsvVisitsSource};
    use crate::reconciler::position::PunchKind;

    #[test]
    fn segments() -> Result<(), String> {
        let data = "\n
            technician,start_coordinates,start_time,end_coordinates,end_time\n
            T9,\"-48.8702222, -26.31832\",\"2023-03-06T08:01:00.000+00:00\",\"-48.8802222, -26.31832\",\"2023-03-06T09:30:00.000+00:00\"\n
            T9,\"-48.8802222 -26.31832\",\"2023-03-06T10:02:00.000+00:00\",,\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvSegmentsSource::new(rdr, None);

        let segments = source.fetch(
            datetime!(2023-03-06 0:00 UTC),
            datetime!(2023-03-07 0:00 UTC),
        )?;
        assert_eq!(2, segments.len());

        let first = &segments[0];
        assert_eq!("T9", first.technician);
        assert_eq!(
            Point::new(-48.8702222, -26.31832),
            first.segment.start_coordinates
        );
        assert_eq!(
            Some(datetime!(2023-03-06 9:30 UTC)),
            first.segment.end_time
        );

        // the second dwell is still open
        assert_eq!(None, segments[1].segment.end_time);
        assert_eq!(None, segments[1].segment.end_coordinates);

        Ok(())
    }

    #[test]
    fn segments_filter() -> Result<(), String> {
        let data = "\n
            technician,start_coordinates,start_time\n
            T9,\"-48.8702222, -26.31832\",\"2023-03-06T08:01:00.000+00:00\"\n
            T9,\"-48.8702222, -26.31832\",\"2023-03-07T08:01:00.000+00:00\"\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvSegmentsSource::new(rdr, None);

        let segments = source.fetch(
            datetime!(2023-03-06 0:00 UTC),
            datetime!(2023-03-06 23:00 UTC),
        )?;
        assert_eq!(1, segments.len());

        Ok(())
    }

    #[test]
    fn segments_skip_blank_coordinates() -> Result<(), String> {
        let data = "\n
            technician,start_coordinates,start_time\n
            T9,\"-48.8702222, -26.31832\",\"2023-03-06T08:01:00.000+00:00\"\n
            T9, ,\"2023-03-06T09:01:00.000+00:00\"\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvSegmentsSource::new(rdr, None);

        let segments = source.fetch(
            datetime!(2023-03-06 0:00 UTC),
            datetime!(2023-03-07 0:00 UTC),
        )?;
        assert_eq!(1, segments.len());

        Ok(())
    }

    #[test]
    fn track() -> Result<(), String> {
        let data = "\n
            technician,coordinates,time\n
            T9,\"-48.8702222, -26.31832\",\"2023-03-06T08:01:00.000+00:00\"\n
            T9,\"-48.8802222;-26.31832\",\"2023-03-06T08:02:00.000+00:00\"\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvTrackSource::new(rdr, None);

        let positions = source.fetch(
            datetime!(2023-03-06 0:00 UTC),
            datetime!(2023-03-07 0:00 UTC),
        )?;
        assert_eq!(2, positions.len());
        assert_eq!(
            Point::new(-48.8802222, -26.31832),
            positions[1].position.coordinates
        );

        Ok(())
    }

    #[test]
    fn punches() -> Result<(), String> {
        let data = "\n
            technician,time,kind\n
            T9,\"2023-03-06T08:01:00.000+00:00\",clock_in\n
            T9,\"2023-03-06T17:04:00.000+00:00\",OUT\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvPunchSource::new(rdr, None);

        let punches = source.fetch(
            datetime!(2023-03-06 0:00 UTC),
            datetime!(2023-03-07 0:00 UTC),
        )?;
        assert_eq!(2, punches.len());
        assert_eq!(PunchKind::ClockIn, punches[0].punch.kind);
        assert_eq!(PunchKind::ClockOut, punches[1].punch.kind);

        Ok(())
    }

    #[test]
    fn punches_unknown_kind_is_an_error() {
        let data = "\n
            technician,time,kind\n
            T9,\"2023-03-06T08:01:00.000+00:00\",lunch\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvPunchSource::new(rdr, None);

        let result = source.fetch(
            datetime!(2023-03-06 0:00 UTC),
            datetime!(2023-03-07 0:00 UTC),
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("lunch"));
    }

    #[test]
    fn visits() -> Result<(), String> {
        let data = "\n
            technician,coordinates,time,name\n
            T9,\"-48.8702222, -26.31832\",\"2023-03-06T08:00:00.000+00:00\",\"Job 1041\"\n
            T9,\"-48.8802222, -26.31832\",\"2023-03-06T13:00:00.000+00:00\",\n
        ";
        let rdr = ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut source = CsvVisitsSource::new(rdr, None);

        let visits = source.fetch(
            datetime!(2023-03-06 0:00 UTC),
            datetime!(2023-03-07 0:00 UTC),
        )?;
        assert_eq!(2, visits.len());
        assert_eq!(Some("Job 1041".to_string()), visits[0].visit.name);
        assert_eq!(None, visits[1].visit.name);

        Ok(())
    }
}
