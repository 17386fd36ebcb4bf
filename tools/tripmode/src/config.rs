//! Run configuration: thresholds and pipeline options
//!
//! Every field has a default, so an empty TOML file (or no file at all) is a
//! valid configuration. Precedence is defaults < config file < CLI flags; the
//! CLI applies its overrides on top of a loaded [`PipelineConfig`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tripmode_common::{Error, Result};

use crate::distance::{unknown_value, DistanceMetric};

/// Default distance threshold in meters
pub const DEFAULT_DISTANCE_M: f64 = 100.0;

/// Default time threshold in seconds (5 minutes)
pub const DEFAULT_TIME_S: f64 = 300.0;

/// Distance/time thresholds shared by segmentation and classification
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    /// Hops shorter than this are "close"; features nearer than this match
    pub distance_m: f64,
    /// Close hops spanning more than this are dwell-worthy
    pub time_s: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            distance_m: DEFAULT_DISTANCE_M,
            time_s: DEFAULT_TIME_S,
        }
    }
}

impl Thresholds {
    pub fn new(distance_m: f64, time_s: f64) -> Result<Self> {
        let t = Self { distance_m, time_s };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.distance_m.is_finite() && self.distance_m > 0.0) {
            return Err(Error::Config(format!(
                "distance threshold must be a positive number of meters, got {}",
                self.distance_m
            )));
        }
        if !(self.time_s.is_finite() && self.time_s >= 0.0) {
            return Err(Error::Config(format!(
                "time threshold must be a non-negative number of seconds, got {}",
                self.time_s
            )));
        }
        Ok(())
    }
}

/// Which samples provide a trip's start/end coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointPolicy {
    /// The trip's own first and last samples
    #[default]
    Trip,
    /// The device's first and last samples overall, for every trip of the
    /// device. Reproduces the legacy pipeline output.
    Device,
}

impl EndpointPolicy {
    const NAMES: [&'static str; 2] = ["trip", "device"];
}

impl fmt::Display for EndpointPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointPolicy::Trip => write!(f, "trip"),
            EndpointPolicy::Device => write!(f, "device"),
        }
    }
}

impl FromStr for EndpointPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trip" => Ok(EndpointPolicy::Trip),
            "device" => Ok(EndpointPolicy::Device),
            _ => Err(unknown_value("endpoint policy", s, &Self::NAMES)),
        }
    }
}

/// Options for the orchestration around the core algorithms
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOptions {
    pub metric: DistanceMetric,
    pub endpoints: EndpointPolicy,
    /// Use R-tree lookups for the mode classifier
    pub spatial_index: bool,
    /// Mode assignments printed after a run
    pub preview_rows: usize,
    /// Worker threads; 0 leaves sizing to rayon
    pub threads: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::default(),
            endpoints: EndpointPolicy::default(),
            spatial_index: true,
            preview_rows: 5,
            threads: 0,
        }
    }
}

/// Complete run configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub thresholds: Thresholds,
    pub pipeline: PipelineOptions,
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.thresholds.distance_m, 100.0);
        assert_eq!(config.thresholds.time_s, 300.0);
        assert_eq!(config.pipeline.metric, DistanceMetric::Geodesic);
        assert_eq!(config.pipeline.endpoints, EndpointPolicy::Trip);
        assert!(config.pipeline.spatial_index);
        assert_eq!(config.pipeline.preview_rows, 5);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [thresholds]
            distance_m = 50.0

            [pipeline]
            metric = "haversine"
            endpoints = "device"
            "#,
        )
        .unwrap();

        assert_eq!(config.thresholds.distance_m, 50.0);
        assert_eq!(config.thresholds.time_s, 300.0);
        assert_eq!(config.pipeline.metric, DistanceMetric::Haversine);
        assert_eq!(config.pipeline.endpoints, EndpointPolicy::Device);
        assert!(config.pipeline.spatial_index);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = PipelineConfig::from_toml_str("[thresholds]\ndistance = 5.0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(Thresholds::new(0.0, 300.0).is_err());
        assert!(Thresholds::new(-5.0, 300.0).is_err());
        assert!(Thresholds::new(100.0, f64::NAN).is_err());
        assert!(Thresholds::new(100.0, 0.0).is_ok());

        let err = PipelineConfig::from_toml_str("[thresholds]\ndistance_m = -1.0\n").unwrap_err();
        assert!(err.to_string().contains("distance threshold"));
    }

    #[test]
    fn test_endpoint_policy_from_str() {
        assert_eq!("TRIP".parse::<EndpointPolicy>().unwrap(), EndpointPolicy::Trip);
        assert_eq!(
            "device".parse::<EndpointPolicy>().unwrap(),
            EndpointPolicy::Device
        );
        let err = "devise".parse::<EndpointPolicy>().unwrap_err();
        assert!(err.to_string().contains("did you mean 'device'?"));
    }
}
