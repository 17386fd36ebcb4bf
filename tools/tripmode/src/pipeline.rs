//! Orchestration: segment every device, enrich trips with endpoint
//! coordinates, classify every trip
//!
//! Reading and writing files is left to [`crate::io`]; the pipeline works on
//! in-memory [`Traces`] and [`ReferenceGeography`].

use std::time::Instant;
use tripmode_common::{Error, Result};

use crate::classify::ModeClassifier;
use crate::config::{EndpointPolicy, PipelineConfig};
use crate::io::format_timestamp;
use crate::segment::{segment_all, DeviceSegmentation};
use crate::types::{DeviceTrace, Dwell, ModeAssignment, ReferenceGeography, Segment, Traces, Trip};

/// Counts reported after a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub devices: usize,
    pub samples: usize,
    pub trips: usize,
    pub dwells: usize,
    pub assignments: usize,
    pub elapsed_ms: u64,
}

/// Trips and dwells of every device, devices in id order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentOutput {
    pub trips: Vec<Trip>,
    pub dwells: Vec<Dwell>,
}

/// Result of a full run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    pub trips: Vec<Trip>,
    pub dwells: Vec<Dwell>,
    pub modes: Vec<ModeAssignment>,
    pub summary: RunSummary,
}

/// Attach start/end coordinates to a trip segment.
///
/// With [`EndpointPolicy::Device`] every trip of a device gets the device's
/// first and last sample positions, as the legacy pipeline did.
pub fn enrich_trip(trace: &DeviceTrace, segment: &Segment, policy: EndpointPolicy) -> Trip {
    let own_first = &trace.samples[segment.first];
    let own_last = &trace.samples[segment.last];
    let (first, last) = match policy {
        EndpointPolicy::Trip => (own_first, own_last),
        EndpointPolicy::Device => (
            trace.first().unwrap_or(own_first),
            trace.last().unwrap_or(own_last),
        ),
    };

    Trip {
        device_id: trace.device_id.clone(),
        start: segment.start,
        end: segment.end,
        start_position: first.position,
        end_position: last.position,
    }
}

fn collect_segments(segmented: &[DeviceSegmentation<'_>], policy: EndpointPolicy) -> SegmentOutput {
    let mut out = SegmentOutput::default();
    for device in segmented {
        let trace = device.trace;
        out.trips.extend(
            device
                .segmentation
                .trips
                .iter()
                .map(|seg| enrich_trip(trace, seg, policy)),
        );
        out.dwells
            .extend(device.segmentation.dwells.iter().map(|seg| Dwell {
                device_id: trace.device_id.clone(),
                start: seg.start,
                end: seg.end,
            }));
    }
    out
}

/// Configured trip/dwell/mode pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Segment all devices and enrich their trips
    pub fn segment(&self, traces: &Traces) -> Result<SegmentOutput> {
        self.install(|| self.segment_inner(traces))
    }

    /// Segment, enrich and classify
    pub fn run(&self, traces: &Traces, reference: &ReferenceGeography) -> Result<PipelineOutput> {
        let started = Instant::now();
        let (segments, modes) = self.install(|| {
            let segments = self.segment_inner(traces)?;

            let opts = &self.config.pipeline;
            let classifier = ModeClassifier::new(
                reference,
                &self.config.thresholds,
                opts.metric,
                opts.spatial_index,
            )?;
            let modes = classifier.classify_all(&segments.trips)?;
            Ok((segments, modes))
        })?;

        let summary = RunSummary {
            devices: traces.devices.len(),
            samples: traces.sample_count(),
            trips: segments.trips.len(),
            dwells: segments.dwells.len(),
            assignments: modes.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            devices = summary.devices,
            samples = summary.samples,
            trips = summary.trips,
            dwells = summary.dwells,
            assignments = summary.assignments,
            elapsed_ms = summary.elapsed_ms,
            "pipeline finished"
        );

        Ok(PipelineOutput {
            trips: segments.trips,
            dwells: segments.dwells,
            modes,
            summary,
        })
    }

    fn segment_inner(&self, traces: &Traces) -> Result<SegmentOutput> {
        let started = Instant::now();
        let opts = &self.config.pipeline;
        let segmented = segment_all(traces, &self.config.thresholds, opts.metric)?;
        let out = collect_segments(&segmented, opts.endpoints);

        tracing::debug!(
            devices = traces.devices.len(),
            trips = out.trips.len(),
            dwells = out.dwells.len(),
            endpoints = %opts.endpoints,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "segmentation done"
        );
        Ok(out)
    }

    /// Run `f` on a dedicated pool when a thread count is configured
    fn install<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> Result<T> + Send,
    {
        match self.config.pipeline.threads {
            0 => f(),
            n => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| Error::Config(format!("cannot start {n} worker threads: {e}")))?
                .install(f),
        }
    }
}

/// Tabular preview of the first `rows` assignments, headed
/// "Modes of Transport:"
pub fn format_preview(modes: &[ModeAssignment], rows: usize) -> String {
    let header = ["", "DeviceID", "Trip_Start", "Trip_End", "Mode"];
    let body: Vec<[String; 5]> = modes
        .iter()
        .take(rows)
        .enumerate()
        .map(|(i, m)| {
            [
                i.to_string(),
                m.device_id.clone(),
                format_timestamp(&m.trip_start),
                format_timestamp(&m.trip_end),
                m.mode.clone(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::from("Modes of Transport:\n");
    if body.is_empty() {
        out.push_str("(no mode assignments)\n");
        return out;
    }

    let mut push_row = |cells: [&str; 5]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(col, (cell, w))| {
                if col == 0 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    push_row(header);
    for row in &body {
        push_row(row.each_ref().map(String::as_str));
    }
    out
}
