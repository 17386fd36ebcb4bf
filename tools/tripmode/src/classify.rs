//! Mode-of-transport inference from trip endpoints
//!
//! Two matchers look at the trip's start and end coordinates independently:
//!
//! - [`PointMatcher`]: first transit point (in reference order) within the
//!   distance threshold of either endpoint labels the trip with its type. One
//!   assignment at most.
//! - [`RouteMatcher`]: every route with a vertex within the threshold of either
//!   endpoint labels the trip "Bus" (route id contains "bus") or "Metro". One
//!   assignment per matching route.
//!
//! The two are not reconciled: a trip may get duplicate or conflicting labels.
//!
//! Both matchers optionally consult a [`FeatureIndex`]. The index only narrows
//! the candidate set; the exact metric decides, and the point matcher still
//! takes the lowest-numbered matching point, so output is identical to the
//! linear scan.

use rayon::prelude::*;
use std::collections::BTreeSet;
use tripmode_common::{Error, Result};

use crate::config::Thresholds;
use crate::distance::DistanceMetric;
use crate::spatial::FeatureIndex;
use crate::types::{GeoPoint, ModeAssignment, ReferenceGeography, TransitPoint, TransitRoute, Trip};

/// Mode label for routes whose id contains "bus"
pub const BUS: &str = "Bus";

/// Mode label for every other route
pub const METRO: &str = "Metro";

/// One strategy for turning a trip into mode assignments
pub trait ModeMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Append this matcher's assignments for `trip` to `out`
    fn assign(&self, trip: &Trip, out: &mut Vec<ModeAssignment>) -> Result<()>;
}

/// Label derived from a route id
pub fn route_mode(route_id: &str) -> &'static str {
    if route_id.to_lowercase().contains("bus") {
        BUS
    } else {
        METRO
    }
}

/// Endpoint proximity test shared by both matchers
#[derive(Clone, Copy, Debug)]
struct Proximity {
    threshold_m: f64,
    metric: DistanceMetric,
}

impl Proximity {
    fn near_trip(&self, trip: &Trip, p: GeoPoint) -> Result<bool> {
        Ok(self.metric.within(trip.start_position, p, self.threshold_m)?
            || self.metric.within(trip.end_position, p, self.threshold_m)?)
    }

    /// Feature ids with a position near either endpoint, or `None` when the
    /// index cannot answer for this trip
    fn indexed_hits(&self, index: &FeatureIndex, trip: &Trip) -> Result<Option<BTreeSet<usize>>> {
        let mut hits = BTreeSet::new();
        for endpoint in [trip.start_position, trip.end_position] {
            let Some(candidates) = index.candidates(endpoint, self.threshold_m) else {
                return Ok(None);
            };
            for c in candidates {
                if !hits.contains(&c.feature)
                    && self.metric.within(endpoint, c.position(), self.threshold_m)?
                {
                    hits.insert(c.feature);
                }
            }
        }
        Ok(Some(hits))
    }
}

/// First-match lookup against transit points
#[derive(Debug)]
pub struct PointMatcher<'a> {
    points: &'a [TransitPoint],
    index: Option<FeatureIndex>,
    proximity: Proximity,
}

impl<'a> PointMatcher<'a> {
    pub fn new(points: &'a [TransitPoint], thresholds: &Thresholds, metric: DistanceMetric) -> Self {
        Self {
            points,
            index: None,
            proximity: Proximity {
                threshold_m: thresholds.distance_m,
                metric,
            },
        }
    }

    pub fn indexed(mut self) -> Self {
        self.index = Some(FeatureIndex::build(
            self.points.iter().enumerate().map(|(i, p)| (i, p.position)),
        ));
        self
    }

    /// Index of the first point near either trip endpoint
    pub fn first_match(&self, trip: &Trip) -> Result<Option<usize>> {
        if let Some(index) = &self.index {
            if let Some(hits) = self.proximity.indexed_hits(index, trip)? {
                return Ok(hits.first().copied());
            }
        }

        for (i, point) in self.points.iter().enumerate() {
            if self.proximity.near_trip(trip, point.position)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

impl ModeMatcher for PointMatcher<'_> {
    fn name(&self) -> &'static str {
        "point"
    }

    fn assign(&self, trip: &Trip, out: &mut Vec<ModeAssignment>) -> Result<()> {
        if let Some(i) = self.first_match(trip)? {
            out.push(ModeAssignment::for_trip(trip, self.points[i].kind.as_str()));
        }
        Ok(())
    }
}

/// Every-match lookup against route polylines
#[derive(Debug)]
pub struct RouteMatcher<'a> {
    routes: &'a [TransitRoute],
    index: Option<FeatureIndex>,
    proximity: Proximity,
}

impl<'a> RouteMatcher<'a> {
    pub fn new(routes: &'a [TransitRoute], thresholds: &Thresholds, metric: DistanceMetric) -> Self {
        Self {
            routes,
            index: None,
            proximity: Proximity {
                threshold_m: thresholds.distance_m,
                metric,
            },
        }
    }

    /// Index vertices of routes that have at least one vertex pair
    pub fn indexed(mut self) -> Self {
        self.index = Some(FeatureIndex::build(
            self.routes
                .iter()
                .enumerate()
                .filter(|(_, r)| r.vertices.len() >= 2)
                .flat_map(|(i, r)| r.vertices.iter().map(move |v| (i, v.position))),
        ));
        self
    }

    /// Indices of routes near either trip endpoint, ascending
    pub fn matches(&self, trip: &Trip) -> Result<Vec<usize>> {
        if let Some(index) = &self.index {
            if let Some(hits) = self.proximity.indexed_hits(index, trip)? {
                return Ok(hits.into_iter().collect());
            }
        }

        let mut matched = Vec::new();
        for (i, route) in self.routes.iter().enumerate() {
            if self.route_is_near(route, trip)? {
                matched.push(i);
            }
        }
        Ok(matched)
    }

    /// Scan consecutive vertex pairs, stopping at the first pair touching
    /// either endpoint
    fn route_is_near(&self, route: &TransitRoute, trip: &Trip) -> Result<bool> {
        for pair in route.vertices.windows(2) {
            if self.proximity.near_trip(trip, pair[0].position)?
                || self.proximity.near_trip(trip, pair[1].position)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl ModeMatcher for RouteMatcher<'_> {
    fn name(&self) -> &'static str {
        "route"
    }

    fn assign(&self, trip: &Trip, out: &mut Vec<ModeAssignment>) -> Result<()> {
        for i in self.matches(trip)? {
            out.push(ModeAssignment::for_trip(
                trip,
                route_mode(&self.routes[i].route_id),
            ));
        }
        Ok(())
    }
}

/// Runs matchers in order over trips
pub struct ModeClassifier<'a> {
    matchers: Vec<Box<dyn ModeMatcher + 'a>>,
}

impl std::fmt::Debug for ModeClassifier<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.matchers.iter().map(|m| m.name()).collect();
        f.debug_struct("ModeClassifier")
            .field("matchers", &names)
            .finish()
    }
}

impl<'a> ModeClassifier<'a> {
    /// Point matcher followed by route matcher over `reference`.
    ///
    /// Reference coordinates are validated up front so the indexed and linear
    /// lookups fail the same way on bad data.
    pub fn new(
        reference: &'a ReferenceGeography,
        thresholds: &Thresholds,
        metric: DistanceMetric,
        spatial_index: bool,
    ) -> Result<Self> {
        if let Some(p) = reference.first_invalid() {
            return Err(Error::InvalidCoordinate { lat: p.lat, lon: p.lon });
        }

        let mut points = PointMatcher::new(&reference.points, thresholds, metric);
        let mut routes = RouteMatcher::new(&reference.routes, thresholds, metric);
        if spatial_index {
            points = points.indexed();
            routes = routes.indexed();
        }

        tracing::debug!(
            points = reference.points.len(),
            routes = reference.routes.len(),
            vertices = reference.vertex_count(),
            spatial_index,
            "mode classifier ready"
        );

        Ok(Self::with_matchers(vec![Box::new(points), Box::new(routes)]))
    }

    pub fn with_matchers(matchers: Vec<Box<dyn ModeMatcher + 'a>>) -> Self {
        Self { matchers }
    }

    /// All assignments for one trip, matcher by matcher
    pub fn classify(&self, trip: &Trip) -> Result<Vec<ModeAssignment>> {
        let mut out = Vec::new();
        for matcher in &self.matchers {
            matcher.assign(trip, &mut out)?;
        }
        Ok(out)
    }

    /// Classify trips in parallel; assignments keep trip order
    pub fn classify_all(&self, trips: &[Trip]) -> Result<Vec<ModeAssignment>> {
        let per_trip: Vec<Vec<ModeAssignment>> = trips
            .par_iter()
            .map(|trip| self.classify(trip))
            .collect::<Result<_>>()?;
        Ok(per_trip.into_iter().flatten().collect())
    }
}
