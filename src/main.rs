//! track2verdict cli - reconcile technician field days into compliance verdicts

use std::fs::{self, File};
use std::io::BufWriter;

use argopt::{cmd_group, subcmd};
use bson::Document;
use csv::Reader;
use mongodb::sync::Client;
use serde::Deserialize;
use time::format_description::well_known;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

use track2verdict::sources::{
    CsvPunchSource, CsvSegmentsSource, CsvVisitsSource, GpxSource, MongoDbSource, TrackSource,
    VisitsSource,
};
use track2verdict::{suggest_home, visit_arrivals, DayReconciler, ReconcileConfig, SourceFields};

/// CLI of track2verdict - Turn your raw field-day records into compliance verdicts
#[cmd_group(commands = [csv, mongo, home, track])]
fn main() -> Result<(), String> {}

/// Reconcile a period from CSV exports
#[subcmd]
fn csv(
    /// Stationary segments CSV file
    segments_path: String,
    /// Time-clock punches CSV file
    punches_path: String,
    /// Scheduled visits CSV file
    visits_path: String,
    /// Start time, RFC3339 format
    start: String,
    /// End time, RFC3339 format
    end: String,
    /// YAML report destination
    destination: String,
    /// Fields, geofences and policy configuration. Default: .track2verdict.yaml, ~/.track2verdict.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logs();

    let (start, end) = parse_period(&start, &end)?;
    let configs = load_configs(config);

    let segments = CsvSegmentsSource::new(open_csv(&segments_path)?, Some(configs.fields.segments));
    let punches = CsvPunchSource::new(open_csv(&punches_path)?, Some(configs.fields.punches));
    let visits = CsvVisitsSource::new(open_csv(&visits_path)?, Some(configs.fields.visits));

    let reports = DayReconciler::build(segments, punches, visits, start, end, &configs.reconcile)?;

    write_yaml(&destination, &reports)
}

/// Reconcile a period with segments from a mongodb collection
#[subcmd]
fn mongo(
    /// Mongo connection string source
    connection: String,
    /// Mongo collection with the stationary segments
    collection: String,
    /// Time-clock punches CSV file
    punches_path: String,
    /// Scheduled visits CSV file
    visits_path: String,
    /// Start time, RFC3339 format
    start: String,
    /// End time, RFC3339 format
    end: String,
    /// YAML report destination
    destination: String,
    /// Fields, geofences and policy configuration. Default: .track2verdict.yaml, ~/.track2verdict.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logs();

    let (start, end) = parse_period(&start, &end)?;
    let configs = load_configs(config);

    let client = Client::with_uri_str(connection)
        .map_err(|e| format!("Failed on connect: {0}", e))?;
    let db = client
        .default_database()
        .ok_or("Default database not provided")?;
    let collection = db.collection::<Document>(&collection);

    let segments = MongoDbSource::new(collection, Some(configs.fields.segments));
    let punches = CsvPunchSource::new(open_csv(&punches_path)?, Some(configs.fields.punches));
    let visits = CsvVisitsSource::new(open_csv(&visits_path)?, Some(configs.fields.visits));

    let reports = DayReconciler::build(segments, punches, visits, start, end, &configs.reconcile)?;

    write_yaml(&destination, &reports)
}

/// Suggest likely home locations from a history of segments
#[subcmd]
fn home(
    /// Stationary segments CSV file
    segments_path: String,
    /// Start time, RFC3339 format
    start: String,
    /// End time, RFC3339 format
    end: String,
    /// YAML report destination
    destination: String,
    /// Fields, geofences and policy configuration. Default: .track2verdict.yaml, ~/.track2verdict.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logs();

    let (start, end) = parse_period(&start, &end)?;
    let configs = load_configs(config);

    let segments = CsvSegmentsSource::new(open_csv(&segments_path)?, Some(configs.fields.segments));

    let reports = suggest_home(segments, start, end, &configs.reconcile.options)?;

    write_yaml(&destination, &reports)
}

/// Check scheduled-visit arrivals against a GPX drive track
#[subcmd]
fn track(
    /// GPX track file
    gpx_path: String,
    /// Scheduled visits CSV file
    visits_path: String,
    /// Technician the track belongs to
    technician: String,
    /// Start time, RFC3339 format
    start: String,
    /// End time, RFC3339 format
    end: String,
    /// YAML report destination
    destination: String,
    /// Fields, geofences and policy configuration. Default: .track2verdict.yaml, ~/.track2verdict.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logs();

    let (start, end) = parse_period(&start, &end)?;
    let configs = load_configs(config);

    let gpx_file = File::open(&gpx_path)
        .map_err(|e| format!("Failed on open the GPX file: {}", e))?;
    let mut source = GpxSource::read(gpx_file, &technician)?;
    let track: Vec<_> = source
        .fetch(start, end)?
        .into_iter()
        .map(|p| p.position)
        .collect();

    let mut visits_source =
        CsvVisitsSource::new(open_csv(&visits_path)?, Some(configs.fields.visits));
    let visits: Vec<_> = visits_source
        .fetch(start, end)?
        .into_iter()
        .filter(|v| v.technician == technician)
        .map(|v| v.visit)
        .collect();

    let reports = visit_arrivals(&track, &visits, &configs.reconcile.options);

    write_yaml(&destination, &reports)
}

fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn parse_period(start: &str, end: &str) -> Result<(OffsetDateTime, OffsetDateTime), String> {
    let start = OffsetDateTime::parse(start, &well_known::Rfc3339)
        .map_err(|e| format!("Failed on parse the start time: {}", e))?;
    let end = OffsetDateTime::parse(end, &well_known::Rfc3339)
        .map_err(|e| format!("Failed on parse the end time: {}", e))?;

    Ok((start, end))
}

fn open_csv(path: &str) -> Result<Reader<File>, String> {
    let file = File::open(path)
        .map_err(|e| format!("Failed on open the CSV file {}: {}", path, e))?;

    Ok(Reader::from_reader(file))
}

fn write_yaml<S>(destination: &str, reports: &S) -> Result<(), String>
where
    S: serde::Serialize,
{
    let destination = File::create(destination)
        .map_err(|e| format!("Failed on create the destination file: {}", e))?;

    let writer = BufWriter::new(destination);
    serde_yaml::to_writer(writer, reports).map_err(|e| e.to_string())
}

/// Load the current config
fn load_configs(provided: Option<String>) -> Configs {
    let mut options = vec![];

    if let Some(sprovided) = provided {
        options.push(sprovided);
    }

    options.push(".track2verdict.yaml".to_string());

    if let Some(home) = dirs::home_dir() {
        if let Some(shome) = home.to_str() {
            options.push(format!("{}/.track2verdict.yaml", shome));
        }
    }

    let mut yaml: Option<String> = None;
    for fi in options {
        if let Ok(s) = fs::read_to_string(fi) {
            yaml = Some(s);
            break;
        }
    }

    if let Some(s) = yaml {
        if let Ok(conf) = serde_yaml::from_str::<Configs>(&s) {
            return conf;
        }
    }

    Configs::default()
}

#[derive(Clone, Debug, PartialEq, Default, Deserialize)]
struct Configs {
    #[serde(default)]
    pub fields: SourceFields,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[test]
fn parse_configs() -> Result<(), String> {
    let yaml = "\nfields: {}\nreconcile: {}";

    let conf: Configs = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;

    assert_eq!("technician", conf.fields.segments.technician);
    assert_eq!("start_time", conf.fields.segments.start_time);
    assert_eq!("coordinates", conf.fields.track.coordinates);
    assert_eq!("kind", conf.fields.punches.kind);
    assert!(!conf.fields.segments.flip_coordinates);
    assert_eq!(500.0, conf.reconcile.options.default_geofence_radius_feet);
    assert_eq!(30, conf.reconcile.options.arrival_pre_window_minutes);
    assert!(conf.reconcile.geofences.office.is_none());
    assert!(conf.reconcile.technicians.is_empty());

    let yaml = "
fields:
  segments:
    technician: tech_id
reconcile:
  options:
    arrival_radius_feet: 250
  geofences:
    office:
      lat: 36.0
      lng: -79.0
      radius_feet: 400
";

    let conf: Configs = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;

    assert_eq!("tech_id", conf.fields.segments.technician);
    assert_eq!(250.0, conf.reconcile.options.arrival_radius_feet);
    let office = conf.reconcile.geofences.office.as_ref().unwrap();
    assert_eq!(Some(400.0), office.radius_feet);

    Ok(())
}
