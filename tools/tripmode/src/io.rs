//! CSV input and output
//!
//! Input headers (exact, case-sensitive):
//! - traces: `DeviceID, Timestamp, Latitude, Longitude`
//! - transit points: `Latitude, Longitude, Type`
//! - transit routes: `RouteID, Latitude, Longitude, Sequence`
//!
//! Extra columns are ignored. Output files are `trips.csv`, `dwells.csv` and
//! `modes_of_transport.csv`, timestamps formatted as `%Y-%m-%d %H:%M:%S`.

use chrono::{DateTime, NaiveDateTime};
use csv::StringRecord;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tripmode_common::{Error, Result};

use crate::types::{
    Dwell, GeoPoint, LocationSample, ModeAssignment, ReferenceGeography, RouteVertex, Timestamp,
    Traces, TransitPoint, Trip,
};

pub const TRIPS_FILE: &str = "trips.csv";
pub const DWELLS_FILE: &str = "dwells.csv";
pub const MODES_FILE: &str = "modes_of_transport.csv";

/// Output timestamp format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive formats tried after RFC 3339
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
];

/// Parse a timestamp cell. RFC 3339 values are normalised to UTC.
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Header positions of the required columns, in request order
fn column_indices<const N: usize>(headers: &StringRecord, required: [&str; N]) -> Result<[usize; N]> {
    let present: Vec<&str> = headers.iter().map(str::trim).collect();
    let mut out = [0usize; N];
    for (slot, column) in out.iter_mut().zip(required) {
        *slot = present
            .iter()
            .position(|h| *h == column)
            .ok_or_else(|| Error::missing_column(column, present.as_slice()))?;
    }
    Ok(out)
}

/// 1-based line of a record, for error messages
fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn field<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).map(str::trim).unwrap_or("")
}

fn parse_f64(record: &StringRecord, idx: usize, column: &str) -> Result<f64> {
    let raw = field(record, idx);
    raw.parse::<f64>().map_err(|_| {
        Error::InvalidInput(format!(
            "line {}: {column} '{raw}' is not a number",
            line_of(record)
        ))
    })
}

fn parse_position(record: &StringRecord, lat_idx: usize, lon_idx: usize) -> Result<GeoPoint> {
    Ok(GeoPoint::new(
        parse_f64(record, lat_idx, "Latitude")?,
        parse_f64(record, lon_idx, "Longitude")?,
    ))
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(input)
}

/// Read location samples; result is grouped by device and time-sorted
pub fn read_traces<R: Read>(input: R) -> Result<Traces> {
    let mut rdr = reader(input);
    let [device_idx, ts_idx, lat_idx, lon_idx] = column_indices(
        rdr.headers()?,
        ["DeviceID", "Timestamp", "Latitude", "Longitude"],
    )?;

    let mut samples = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let raw_ts = field(&record, ts_idx);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| Error::InvalidTimestamp {
            value: raw_ts.to_string(),
            line: line_of(&record),
        })?;
        samples.push(LocationSample {
            device_id: field(&record, device_idx).to_string(),
            timestamp,
            position: parse_position(&record, lat_idx, lon_idx)?,
        });
    }

    Ok(Traces::from_samples(samples))
}

/// Read transit points, preserving file order
pub fn read_points<R: Read>(input: R) -> Result<Vec<TransitPoint>> {
    let mut rdr = reader(input);
    let [lat_idx, lon_idx, type_idx] =
        column_indices(rdr.headers()?, ["Latitude", "Longitude", "Type"])?;

    rdr.records()
        .map(|record| -> Result<TransitPoint> {
            let record = record?;
            Ok(TransitPoint {
                position: parse_position(&record, lat_idx, lon_idx)?,
                kind: field(&record, type_idx).to_string(),
            })
        })
        .collect()
}

/// Read route vertices as loose `(route_id, vertex)` rows
pub fn read_route_vertices<R: Read>(input: R) -> Result<Vec<(String, RouteVertex)>> {
    let mut rdr = reader(input);
    let [route_idx, lat_idx, lon_idx, seq_idx] = column_indices(
        rdr.headers()?,
        ["RouteID", "Latitude", "Longitude", "Sequence"],
    )?;

    rdr.records()
        .map(|record| -> Result<(String, RouteVertex)> {
            let record = record?;
            let raw_seq = field(&record, seq_idx);
            let sequence = raw_seq.parse::<i64>().map_err(|_| {
                Error::InvalidInput(format!(
                    "line {}: Sequence '{raw_seq}' is not an integer",
                    line_of(&record)
                ))
            })?;
            Ok((
                field(&record, route_idx).to_string(),
                RouteVertex {
                    position: parse_position(&record, lat_idx, lon_idx)?,
                    sequence,
                },
            ))
        })
        .collect()
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })
}

pub fn load_traces(path: &Path) -> Result<Traces> {
    read_traces(open(path)?)
}

/// Load points and routes into a [`ReferenceGeography`]
pub fn load_reference(points: &Path, routes: &Path) -> Result<ReferenceGeography> {
    let points = read_points(open(points)?)?;
    let vertices = read_route_vertices(open(routes)?)?;
    Ok(ReferenceGeography::from_parts(points, vertices))
}

#[derive(Serialize)]
struct TripRow<'a> {
    #[serde(rename = "DeviceID")]
    device_id: &'a str,
    #[serde(rename = "Start")]
    start: String,
    #[serde(rename = "End")]
    end: String,
    #[serde(rename = "Start_Latitude")]
    start_latitude: f64,
    #[serde(rename = "Start_Longitude")]
    start_longitude: f64,
    #[serde(rename = "End_Latitude")]
    end_latitude: f64,
    #[serde(rename = "End_Longitude")]
    end_longitude: f64,
}

#[derive(Serialize)]
struct DwellRow<'a> {
    #[serde(rename = "DeviceID")]
    device_id: &'a str,
    #[serde(rename = "Start")]
    start: String,
    #[serde(rename = "End")]
    end: String,
}

#[derive(Serialize)]
struct ModeRow<'a> {
    #[serde(rename = "DeviceID")]
    device_id: &'a str,
    #[serde(rename = "Trip_Start")]
    trip_start: String,
    #[serde(rename = "Trip_End")]
    trip_end: String,
    #[serde(rename = "Mode")]
    mode: &'a str,
}

/// Serialize rows, writing the header even when there are none
fn write_rows<W, T, I>(output: W, header: &[&str], rows: I) -> Result<()>
where
    W: Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trips<W: Write>(output: W, trips: &[Trip]) -> Result<()> {
    write_rows(
        output,
        &[
            "DeviceID",
            "Start",
            "End",
            "Start_Latitude",
            "Start_Longitude",
            "End_Latitude",
            "End_Longitude",
        ],
        trips.iter().map(|t| TripRow {
            device_id: &t.device_id,
            start: format_timestamp(&t.start),
            end: format_timestamp(&t.end),
            start_latitude: t.start_position.lat,
            start_longitude: t.start_position.lon,
            end_latitude: t.end_position.lat,
            end_longitude: t.end_position.lon,
        }),
    )
}

pub fn write_dwells<W: Write>(output: W, dwells: &[Dwell]) -> Result<()> {
    write_rows(
        output,
        &["DeviceID", "Start", "End"],
        dwells.iter().map(|d| DwellRow {
            device_id: &d.device_id,
            start: format_timestamp(&d.start),
            end: format_timestamp(&d.end),
        }),
    )
}

pub fn write_modes<W: Write>(output: W, modes: &[ModeAssignment]) -> Result<()> {
    write_rows(
        output,
        &["DeviceID", "Trip_Start", "Trip_End", "Mode"],
        modes.iter().map(|m| ModeRow {
            device_id: &m.device_id,
            trip_start: format_timestamp(&m.trip_start),
            trip_end: format_timestamp(&m.trip_end),
            mode: &m.mode,
        }),
    )
}

/// Paths of the files written by [`write_outputs`]
#[derive(Debug, Clone, Default)]
pub struct OutputPaths {
    pub trips: Option<PathBuf>,
    pub dwells: Option<PathBuf>,
    pub modes: Option<PathBuf>,
}

/// Write trips, dwells and (when given) mode assignments into `outdir`,
/// creating it if needed
pub fn write_outputs(
    outdir: &Path,
    trips: &[Trip],
    dwells: &[Dwell],
    modes: Option<&[ModeAssignment]>,
) -> Result<OutputPaths> {
    std::fs::create_dir_all(outdir)?;

    let trips_path = outdir.join(TRIPS_FILE);
    write_trips(File::create(&trips_path)?, trips)?;

    let dwells_path = outdir.join(DWELLS_FILE);
    write_dwells(File::create(&dwells_path)?, dwells)?;

    let modes_path = match modes {
        Some(modes) => {
            let path = outdir.join(MODES_FILE);
            write_modes(File::create(&path)?, modes)?;
            Some(path)
        }
        None => None,
    };

    Ok(OutputPaths {
        trips: Some(trips_path),
        dwells: Some(dwells_path),
        modes: modes_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2024-06-01 08:15:30"), Some(ts(8, 15, 30)));
        assert_eq!(parse_timestamp("2024-06-01T08:15:30"), Some(ts(8, 15, 30)));
        assert_eq!(parse_timestamp(" 2024-06-01 08:15 "), Some(ts(8, 15, 0)));
        assert_eq!(parse_timestamp("2024-06-01T10:15:30+02:00"), Some(ts(8, 15, 30)));
        assert_eq!(parse_timestamp("2024-06-01T08:15:30Z"), Some(ts(8, 15, 30)));
        let frac = parse_timestamp("2024-06-01 08:15:30.250").unwrap();
        assert_eq!(frac - ts(8, 15, 30), chrono::Duration::milliseconds(250));
        assert_eq!(parse_timestamp("2024/06/01 08:15:30"), Some(ts(8, 15, 30)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_read_traces_sorts_and_groups() {
        let csv = "\
DeviceID,Timestamp,Latitude,Longitude,Accuracy
b,2024-06-01 08:10:00,50.1,4.1,5
a,2024-06-01 08:05:00,50.0,4.0,5
b,2024-06-01 08:00:00,50.2,4.2,5
";
        let traces = read_traces(csv.as_bytes()).unwrap();
        assert_eq!(traces.devices.len(), 2);
        assert_eq!(traces.devices[0].device_id, "a");
        let b = &traces.devices[1];
        assert_eq!(b.samples[0].timestamp, ts(8, 0, 0));
        assert_eq!(b.samples[0].position, GeoPoint::new(50.2, 4.2));
        assert_eq!(b.samples[1].timestamp, ts(8, 10, 0));
    }

    #[test]
    fn test_read_traces_missing_column_suggests() {
        let csv = "DeviceID,Timestamp,Lattitude,Longitude\n";
        let err = read_traces(csv.as_bytes()).unwrap_err();
        match err {
            Error::MissingColumn { column, suggestion } => {
                assert_eq!(column, "Latitude");
                assert_eq!(suggestion.as_deref(), Some("Lattitude"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_traces_bad_values() {
        let bad_ts = "DeviceID,Timestamp,Latitude,Longitude\nd,soon,50,4\n";
        assert!(matches!(
            read_traces(bad_ts.as_bytes()).unwrap_err(),
            Error::InvalidTimestamp { line: 2, .. }
        ));

        let bad_lat = "DeviceID,Timestamp,Latitude,Longitude\nd,2024-06-01 08:00:00,north,4\n";
        let err = read_traces(bad_lat.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Latitude 'north'"), "{err}");
    }

    #[test]
    fn test_read_points_keeps_order() {
        let csv = "Latitude,Longitude,Type\n50.5,4.5,Metro\n50.0,4.0,Bus\n";
        let points = read_points(csv.as_bytes()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].kind, "Metro");
        assert_eq!(points[1].position, GeoPoint::new(50.0, 4.0));
    }

    #[test]
    fn test_read_routes_sorted_by_sequence() {
        let csv = "\
RouteID,Latitude,Longitude,Sequence
metro-2,50.02,4.0,2
bus-1,50.0,4.0,1
metro-2,50.01,4.0,1
";
        let vertices = read_route_vertices(csv.as_bytes()).unwrap();
        let geo = ReferenceGeography::from_parts(vec![], vertices);
        assert_eq!(geo.routes[0].route_id, "bus-1");
        assert_eq!(geo.routes[1].vertices[0].position.lat, 50.01);
        assert_eq!(geo.routes[1].vertices[1].position.lat, 50.02);

        let bad = "RouteID,Latitude,Longitude,Sequence\nr,50,4,first\n";
        assert!(read_route_vertices(bad.as_bytes()).is_err());
    }

    #[test]
    fn test_write_modes_and_dwells() {
        let modes = vec![ModeAssignment {
            device_id: "d1".to_string(),
            trip_start: ts(8, 0, 0),
            trip_end: ts(8, 30, 0),
            mode: "Bus".to_string(),
        }];
        let mut buf = Vec::new();
        write_modes(&mut buf, &modes).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "DeviceID,Trip_Start,Trip_End,Mode\nd1,2024-06-01 08:00:00,2024-06-01 08:30:00,Bus\n"
        );

        let mut buf = Vec::new();
        write_dwells(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "DeviceID,Start,End\n");
    }

    #[test]
    fn test_write_trips_columns() {
        let trips = vec![Trip {
            device_id: "d1".to_string(),
            start: ts(8, 0, 0),
            end: ts(8, 5, 0),
            start_position: GeoPoint::new(50.5, 4.25),
            end_position: GeoPoint::new(50.75, 4.5),
        }];
        let mut buf = Vec::new();
        write_trips(&mut buf, &trips).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("DeviceID,Start,End,Start_Latitude,Start_Longitude,End_Latitude,End_Longitude")
        );
        assert_eq!(
            lines.next(),
            Some("d1,2024-06-01 08:00:00,2024-06-01 08:05:00,50.5,4.25,50.75,4.5")
        );
    }

    #[test]
    fn test_write_outputs_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        let outdir = dir.path().join("nested/out");
        let paths = write_outputs(&outdir, &[], &[], None).unwrap();
        assert!(outdir.join(TRIPS_FILE).exists());
        assert!(outdir.join(DWELLS_FILE).exists());
        assert!(paths.modes.is_none());
        assert!(!outdir.join(MODES_FILE).exists());
    }
}
