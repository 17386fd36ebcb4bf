pub mod types;
pub mod distance;
pub mod config;
pub mod segment;
pub mod spatial;
pub mod classify;
pub mod io;
pub mod pipeline;
pub mod cli;

pub use classify::{ModeClassifier, ModeMatcher, PointMatcher, RouteMatcher};
pub use config::{EndpointPolicy, PipelineConfig, Thresholds};
pub use distance::DistanceMetric;
pub use pipeline::{Pipeline, PipelineOutput, RunSummary};
pub use segment::{segment_all, segment_device, Segmentation};
pub use types::{Dwell, GeoPoint, LocationSample, ModeAssignment, ReferenceGeography, Traces, Trip};
pub use tripmode_common::{Error, Result};
