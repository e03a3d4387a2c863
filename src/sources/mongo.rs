//! Mongodb source integration

use bson::{doc, Bson, DateTime, Document};
use geo::geometry::Point;
use mongodb::sync::Collection;
use time::format_description::well_known;
use time::OffsetDateTime;

use super::{SegmentFields, SegmentsSource, TechnicianSegment};
use crate::reconciler::position::StationarySegment;

/// MongoDB dwell-segments source
pub struct MongoDbSource {
    collection: Collection<Document>,
    fields: SegmentFields,
}

impl MongoDbSource {
    pub fn new(collection: Collection<Document>, fields: Option<SegmentFields>) -> Self {
        Self {
            collection,
            fields: match fields {
                Some(f) => f,
                None => SegmentFields::default(),
            },
        }
    }
}

impl SegmentsSource for MongoDbSource {
    fn fetch(
        &mut self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TechnicianSegment>, String> {
        let mut segments = vec![];

        let filter = doc! {
            self.fields.start_time.clone(): doc! {
                "$gte": DateTime::from_time_0_3(start),
                "$lte": DateTime::from_time_0_3(end)
            }
        };
        let cursor = self
            .collection
            .find(filter, None)
            .map_err(|e| format!("Failed on fetch the docs: {}", e))?;

        for rdoc in cursor {
            let doc = rdoc.map_err(|e| format!("Failed on read some doc: {}", e))?;

            let id = doc
                .get_object_id("_id")
                .map_err(|e| format!("Failed on access the doc id: {}", e))?;

            let seg = match parse_doc(&self.fields, &doc) {
                Ok(seg) => Ok(seg),
                Err(e) => Err(format!("Error with doc {0}: {1}", id, e)),
            }?;

            segments.push(seg);
        }

        Ok(segments)
    }
}

fn parse_doc(fields: &SegmentFields, doc: &Document) -> Result<TechnicianSegment, String> {
    let technician = match doc.get(fields.technician.clone()) {
        Some(Bson::String(t)) => Ok(t.clone()),
        Some(Bson::Int32(t)) => Ok(t.to_string()),
        Some(Bson::Int64(t)) => Ok(t.to_string()),
        Some(Bson::Double(t)) => Ok(t.to_string()),
        Some(_) => Err("Technician field type not supported"),
        None => Err("Technician field not found"),
    }?;

    let start_place = parse_coordinates(doc, &fields.start_coordinates, fields.flip_coordinates)?
        .ok_or("Start coordinates field not found")?;
    let start_time = parse_instant(doc, &fields.start_time)?
        .ok_or("Start time field not found")?;

    let mut segment = StationarySegment::open(start_place, start_time);

    let end_place = parse_coordinates(doc, &fields.end_coordinates, fields.flip_coordinates)?;
    let end_time = parse_instant(doc, &fields.end_time)?;
    if let (Some(place), Some(time)) = (end_place, end_time) {
        segment = StationarySegment::closed(start_place, start_time, place, time);
    }

    Ok(TechnicianSegment {
        technician,
        segment,
    })
}

fn parse_coordinates(doc: &Document, field: &str, flip: bool) -> Result<Option<Point>, String> {
    let coordinates = match doc.get_array(field) {
        Ok(c) => c,
        Err(_) => return Ok(None),
    };
    if coordinates.len() != 2 {
        return Err("Coordinates size invalid".to_string());
    }

    let mut ilat = 1;
    let mut ilng = 0;
    if flip {
        ilat = 0;
        ilng = 1;
    }

    let lat = match coordinates[ilat] {
        Bson::Double(l) => Ok(l),
        _ => Err("Invalid type of latitude".to_string()),
    }?;
    let lng = match coordinates[ilng] {
        Bson::Double(l) => Ok(l),
        _ => Err("Invalid type of longitude".to_string()),
    }?;

    Ok(Some(Point::new(lng, lat)))
}

fn parse_instant(doc: &Document, field: &str) -> Result<Option<OffsetDateTime>, String> {
    match doc.get(field) {
        Some(Bson::String(tm)) => OffsetDateTime::parse(tm, &well_known::Rfc3339)
            .map(Some)
            .map_err(|e| format!("Failed on parse the time: {}", e)),
        Some(Bson::DateTime(tm)) => Ok(Some(tm.to_time_0_3())),
        Some(Bson::Timestamp(tm)) => OffsetDateTime::from_unix_timestamp(tm.time.into())
            .map(Some)
            .map_err(|e| format!("Failed on parse the time timestamp: {}", e)),
        Some(Bson::Null) | None => Ok(None),
        Some(_) => Err("Time field type not supported".to_string()),
    }
}

#[cfg(test)]
pub mod tests {
    use bson::doc;
    use geo::geometry::Point;
    use time::macros::datetime;

    use super::super::SegmentFields;
    use super::parse_doc;

    #[test]
    fn doc_with_open_dwell() -> Result<(), String> {
        let doc = doc! {
            "technician": "T9",
            "start_coordinates": [-48.8702222, -26.31832],
            "start_time": "2023-03-06T08:01:00Z",
        };

        let seg = parse_doc(&SegmentFields::default(), &doc)?;

        assert_eq!("T9", seg.technician);
        assert_eq!(
            Point::new(-48.8702222, -26.31832),
            seg.segment.start_coordinates
        );
        assert_eq!(datetime!(2023-03-06 8:01 UTC), seg.segment.start_time);
        assert_eq!(None, seg.segment.end_time);

        Ok(())
    }

    #[test]
    fn doc_with_closed_dwell_and_bson_dates() -> Result<(), String> {
        let doc = doc! {
            "technician": 251,
            "start_coordinates": [-48.8702222, -26.31832],
            "start_time": bson::DateTime::from_time_0_3(datetime!(2023-03-06 8:01 UTC)),
            "end_coordinates": [-48.8802222, -26.31832],
            "end_time": bson::DateTime::from_time_0_3(datetime!(2023-03-06 9:30 UTC)),
        };

        let seg = parse_doc(&SegmentFields::default(), &doc)?;

        assert_eq!("251", seg.technician);
        assert_eq!(
            Some(datetime!(2023-03-06 9:30 UTC)),
            seg.segment.end_time
        );
        assert_eq!(
            Some(Point::new(-48.8802222, -26.31832)),
            seg.segment.end_coordinates
        );

        Ok(())
    }

    #[test]
    fn doc_with_custom_fields() -> Result<(), String> {
        let doc = doc! {
            "tech": "T9",
            "parked_at": [-48.8702222, -26.31832],
            "parked_from": "2023-03-06T08:01:00Z",
        };

        let fields = SegmentFields::default()
            .technician("tech")
            .start_coordinates("parked_at")
            .start_time("parked_from")
            .done();

        let seg = parse_doc(&fields, &doc)?;
        assert_eq!("T9", seg.technician);

        Ok(())
    }

    #[test]
    fn doc_missing_the_technician() {
        let doc = doc! {
            "start_coordinates": [-48.8702222, -26.31832],
            "start_time": "2023-03-06T08:01:00Z",
        };

        let parsed = parse_doc(&SegmentFields::default(), &doc);
        assert!(parsed.is_err());
    }
}
