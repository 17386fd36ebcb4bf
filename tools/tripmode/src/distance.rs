//! Surface distance between two WGS84 positions, in meters

use geo::{Distance, Geodesic, Haversine, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tripmode_common::{suggest_correction, Error, Result};

use crate::types::GeoPoint;

/// Distance model used for every threshold comparison
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Karney geodesic on the WGS84 ellipsoid
    #[default]
    Geodesic,
    /// Great circle on a sphere of mean Earth radius; cheaper, ~0.5% error
    Haversine,
}

impl DistanceMetric {
    const NAMES: [&'static str; 2] = ["geodesic", "haversine"];

    /// Distance in meters. Fails on out-of-range or non-finite coordinates.
    pub fn distance(self, a: GeoPoint, b: GeoPoint) -> Result<f64> {
        let p1 = to_point(a)?;
        let p2 = to_point(b)?;
        Ok(match self {
            DistanceMetric::Geodesic => Geodesic::distance(p1, p2),
            DistanceMetric::Haversine => Haversine::distance(p1, p2),
        })
    }

    /// `distance(a, b) < threshold_m`
    pub fn within(self, a: GeoPoint, b: GeoPoint, threshold_m: f64) -> Result<bool> {
        Ok(self.distance(a, b)? < threshold_m)
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Geodesic => write!(f, "geodesic"),
            DistanceMetric::Haversine => write!(f, "haversine"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "geodesic" => Ok(DistanceMetric::Geodesic),
            "haversine" => Ok(DistanceMetric::Haversine),
            _ => Err(unknown_value("metric", s, &Self::NAMES)),
        }
    }
}

/// `Error::Config` for an unrecognised option value, with a suggestion
pub(crate) fn unknown_value(option: &str, value: &str, known: &[&str]) -> Error {
    let hint = suggest_correction(value, known)
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default();
    Error::Config(format!(
        "unknown {option} '{value}', expected one of: {}{hint}",
        known.join(", ")
    ))
}

fn to_point(p: GeoPoint) -> Result<Point<f64>> {
    if !p.is_valid() {
        return Err(Error::InvalidCoordinate {
            lat: p.lat,
            lon: p.lon,
        });
    }
    Ok(Point::new(p.lon, p.lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRUSSELS: GeoPoint = GeoPoint::new(50.8467, 4.3525);
    const ANTWERP: GeoPoint = GeoPoint::new(51.2194, 4.4025);

    #[test]
    fn test_zero_distance() {
        for metric in [DistanceMetric::Geodesic, DistanceMetric::Haversine] {
            let d = metric.distance(BRUSSELS, BRUSSELS).unwrap();
            assert!(d.abs() < 1e-6, "{metric}: {d}");
        }
    }

    #[test]
    fn test_brussels_antwerp() {
        // ~41.6 km apart
        let g = DistanceMetric::Geodesic.distance(BRUSSELS, ANTWERP).unwrap();
        let h = DistanceMetric::Haversine.distance(BRUSSELS, ANTWERP).unwrap();
        assert!((g - 41_600.0).abs() < 500.0, "geodesic: {g}");
        assert!((h - g).abs() / g < 0.01, "haversine {h} vs geodesic {g}");
    }

    #[test]
    fn test_one_millidegree_latitude() {
        // 0.001 deg of latitude is ~111 m at mid latitudes
        let a = GeoPoint::new(45.0, 7.0);
        let b = GeoPoint::new(45.001, 7.0);
        let d = DistanceMetric::Geodesic.distance(a, b).unwrap();
        assert!((d - 111.1).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_invalid_coordinate_is_rejected() {
        let bad = GeoPoint::new(91.0, 0.0);
        let err = DistanceMetric::Geodesic.distance(BRUSSELS, bad).unwrap_err();
        assert!(matches!(err, Error::InvalidCoordinate { lat, .. } if lat == 91.0));

        let nan = GeoPoint::new(0.0, f64::NAN);
        assert!(DistanceMetric::Haversine.distance(nan, BRUSSELS).is_err());
    }

    #[test]
    fn test_within_is_strict() {
        let d = DistanceMetric::Haversine.distance(BRUSSELS, ANTWERP).unwrap();
        assert!(!DistanceMetric::Haversine
            .within(BRUSSELS, ANTWERP, d)
            .unwrap());
        assert!(DistanceMetric::Haversine
            .within(BRUSSELS, ANTWERP, d + 1.0)
            .unwrap());
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!(
            "Haversine".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Haversine
        );
        let err = "geodesik".parse::<DistanceMetric>().unwrap_err();
        assert!(err.to_string().contains("did you mean 'geodesic'?"));
    }
}
