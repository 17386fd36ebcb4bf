//! Core records: location samples, reference geography, trips, dwells and
//! mode assignments

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Sample timestamp. Naive, interpreted as UTC by the loaders.
pub type Timestamp = NaiveDateTime;

/// WGS84 position in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Latitude in [-90, 90], longitude in [-180, 180], both finite
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// One location fix of one device
#[derive(Clone, Debug, PartialEq)]
pub struct LocationSample {
    pub device_id: String,
    pub timestamp: Timestamp,
    pub position: GeoPoint,
}

/// All samples of a single device, ascending by timestamp
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceTrace {
    pub device_id: String,
    pub samples: Vec<LocationSample>,
}

impl DeviceTrace {
    pub fn first(&self) -> Option<&LocationSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&LocationSample> {
        self.samples.last()
    }
}

/// Per-device traces, ordered by device id
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Traces {
    pub devices: Vec<DeviceTrace>,
}

impl Traces {
    /// Group samples by device and sort each device by timestamp.
    ///
    /// The sort is stable: samples sharing a timestamp keep their input order.
    pub fn from_samples(samples: Vec<LocationSample>) -> Self {
        let mut by_device: BTreeMap<String, Vec<LocationSample>> = BTreeMap::new();
        for sample in samples {
            by_device
                .entry(sample.device_id.clone())
                .or_default()
                .push(sample);
        }

        let devices = by_device
            .into_iter()
            .map(|(device_id, mut samples)| {
                samples.sort_by_key(|s| s.timestamp);
                DeviceTrace { device_id, samples }
            })
            .collect();

        Self { devices }
    }

    pub fn sample_count(&self) -> usize {
        self.devices.iter().map(|d| d.samples.len()).sum()
    }
}

/// Stop or station with a mode label
#[derive(Clone, Debug, PartialEq)]
pub struct TransitPoint {
    pub position: GeoPoint,
    pub kind: String,
}

/// One vertex of a route polyline
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteVertex {
    pub position: GeoPoint,
    pub sequence: i64,
}

/// Bus or metro line as an ordered polyline
#[derive(Clone, Debug, PartialEq)]
pub struct TransitRoute {
    pub route_id: String,
    pub vertices: Vec<RouteVertex>,
}

/// Reference transit geography shared read-only by the classifier
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceGeography {
    /// Points in file order; the point matcher depends on this order
    pub points: Vec<TransitPoint>,
    /// Routes ascending by id, vertices ascending by sequence
    pub routes: Vec<TransitRoute>,
}

impl ReferenceGeography {
    /// Assemble geography from points and loose `(route_id, vertex)` rows
    pub fn from_parts(points: Vec<TransitPoint>, vertices: Vec<(String, RouteVertex)>) -> Self {
        let mut by_route: BTreeMap<String, Vec<RouteVertex>> = BTreeMap::new();
        for (route_id, vertex) in vertices {
            by_route.entry(route_id).or_default().push(vertex);
        }

        let routes = by_route
            .into_iter()
            .map(|(route_id, mut vertices)| {
                vertices.sort_by_key(|v| v.sequence);
                TransitRoute { route_id, vertices }
            })
            .collect();

        Self { points, routes }
    }

    pub fn vertex_count(&self) -> usize {
        self.routes.iter().map(|r| r.vertices.len()).sum()
    }

    /// First position that fails coordinate validation, if any
    pub fn first_invalid(&self) -> Option<GeoPoint> {
        self.points
            .iter()
            .map(|p| p.position)
            .chain(
                self.routes
                    .iter()
                    .flat_map(|r| r.vertices.iter().map(|v| v.position)),
            )
            .find(|p| !p.is_valid())
    }
}

/// Interval of one device's timeline as produced by the segmentation scan.
///
/// `first` and `last` index the device's sample slice; `start`/`end` are the
/// timestamps of those samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start: Timestamp,
    pub end: Timestamp,
    pub first: usize,
    pub last: usize,
}

/// Moving interval with enriched endpoint coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct Trip {
    pub device_id: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub start_position: GeoPoint,
    pub end_position: GeoPoint,
}

/// Stationary interval
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dwell {
    pub device_id: String,
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Candidate transport mode for one trip
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeAssignment {
    pub device_id: String,
    pub trip_start: Timestamp,
    pub trip_end: Timestamp,
    pub mode: String,
}

impl ModeAssignment {
    pub fn for_trip(trip: &Trip, mode: impl Into<String>) -> Self {
        Self {
            device_id: trip.device_id.clone(),
            trip_start: trip.start,
            trip_end: trip.end,
            mode: mode.into(),
        }
    }
}
