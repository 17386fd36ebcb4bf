//! R-tree over reference positions (transit points, route vertices)
//!
//! The tree lives in plain lon/lat degree space. A query turns a radius in
//! meters into a conservative lon/lat box; every feature within the radius is
//! guaranteed to fall inside the box, and callers re-check candidates with the
//! exact distance metric. Boxes that would wrap the antimeridian or reach a
//! pole cannot be expressed as one envelope, so [`FeatureIndex::candidates`]
//! returns `None` and callers fall back to a linear scan.

use rstar::{RTree, RTreeObject, AABB};

use crate::types::GeoPoint;

/// Lower bound on meters per degree of latitude (WGS84 minimum is ~110 574 m)
const MIN_METERS_PER_DEG: f64 = 110_000.0;

/// Envelope inflation on top of the lower bound
const SAFETY: f64 = 1.1;

/// Boxes reaching beyond this latitude are not indexed
const MAX_INDEXED_LAT: f64 = 89.0;

/// Reference position tagged with the index of the feature it belongs to
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeaturePosition {
    /// `[lon, lat]`
    pub coords: [f64; 2],
    pub feature: usize,
}

impl FeaturePosition {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.coords[1], self.coords[0])
    }
}

impl RTreeObject for FeaturePosition {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_point(self.coords)
    }
}

/// Spatial index over reference positions
#[derive(Debug)]
pub struct FeatureIndex {
    tree: RTree<FeaturePosition>,
}

impl FeatureIndex {
    /// Build from `(feature index, position)` pairs
    pub fn build<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = (usize, GeoPoint)>,
    {
        let points: Vec<FeaturePosition> = positions
            .into_iter()
            .map(|(feature, p)| FeaturePosition {
                coords: [p.lon, p.lat],
                feature,
            })
            .collect();

        Self {
            tree: RTree::bulk_load(points),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Positions that may lie within `radius_m` of `center`.
    ///
    /// Superset of the true answer; `None` when the search box cannot be
    /// represented (see module docs).
    pub fn candidates(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> Option<impl Iterator<Item = &FeaturePosition> + '_> {
        let envelope = search_envelope(center, radius_m)?;
        Some(self.tree.locate_in_envelope(&envelope))
    }
}

/// Lon/lat box containing every position within `radius_m` of `center`
pub fn search_envelope(center: GeoPoint, radius_m: f64) -> Option<AABB<[f64; 2]>> {
    if !center.is_valid() || !radius_m.is_finite() || radius_m < 0.0 {
        return None;
    }

    let dlat = radius_m / MIN_METERS_PER_DEG * SAFETY;
    let max_abs_lat = center.lat.abs() + dlat;
    if max_abs_lat >= MAX_INDEXED_LAT {
        return None;
    }

    let dlon = dlat / max_abs_lat.to_radians().cos();
    let (west, east) = (center.lon - dlon, center.lon + dlon);
    if west < -180.0 || east > 180.0 {
        return None;
    }

    Some(AABB::from_corners(
        [west, center.lat - dlat],
        [east, center.lat + dlat],
    ))
}
