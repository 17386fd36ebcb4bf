//! Trip/dwell segmentation of a single device timeline
//!
//! A single forward scan over consecutive sample pairs. Each pair is either
//! "close" (hop shorter than the distance threshold) or "far". Two trackers are
//! kept side by side and updated independently on every step:
//!
//! - `open_trip`: opened by a far hop, closed by the next close hop
//! - `open_dwell`: opened by a close hop that also spans more than the time
//!   threshold, extended by every further such hop, closed by the next far hop
//!
//! A close hop that is too short in time neither opens nor extends a dwell, but
//! still closes a trip. Because the trackers are independent, one boundary
//! sample can close a trip and open a dwell in the same step.
//!
//! | hop                 | open_trip                    | open_dwell                       |
//! |---------------------|------------------------------|----------------------------------|
//! | close, long gap     | close at sample i-1, if open | open at i-1 if none, end := i    |
//! | close, short gap    | close at sample i-1, if open | unchanged                        |
//! | far                 | open at i-1, if none         | close at its recorded end, if open |
//!
//! At the end of the scan an open trip closes at the last sample and an open
//! dwell closes at its last recorded end.

use rayon::prelude::*;
use tripmode_common::Result;

use crate::config::Thresholds;
use crate::distance::DistanceMetric;
use crate::types::{DeviceTrace, LocationSample, Segment, Timestamp, Traces};

/// Scan output for one device
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segmentation {
    /// Moving intervals, ascending by start
    pub trips: Vec<Segment>,
    /// Stationary intervals, ascending by start
    pub dwells: Vec<Segment>,
    /// Consecutive pairs examined (`n - 1` for `n >= 1` samples)
    pub steps: usize,
}

/// Segmentation of one device of a [`Traces`] collection
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSegmentation<'a> {
    pub trace: &'a DeviceTrace,
    pub segmentation: Segmentation,
}

#[derive(Clone, Copy, Debug)]
struct OpenDwell {
    first: usize,
    last: usize,
}

/// Segment one device's time-ordered samples.
///
/// Fewer than two samples produce an empty result. Fails only when a sample
/// carries an invalid coordinate.
pub fn segment_device(
    samples: &[LocationSample],
    thresholds: &Thresholds,
    metric: DistanceMetric,
) -> Result<Segmentation> {
    let mut out = Segmentation::default();
    if samples.len() < 2 {
        return Ok(out);
    }

    let mut open_trip: Option<usize> = None;
    let mut open_dwell: Option<OpenDwell> = None;

    for (prev_idx, pair) in samples.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        let cur_idx = prev_idx + 1;
        out.steps += 1;

        let distance = metric.distance(prev.position, cur.position)?;
        let elapsed = elapsed_seconds(prev.timestamp, cur.timestamp);
        if elapsed <= 0.0 {
            tracing::warn!(
                device = %cur.device_id,
                at = %cur.timestamp,
                "non-increasing timestamp in device trace"
            );
        }

        if distance < thresholds.distance_m {
            if elapsed > thresholds.time_s {
                let dwell = open_dwell.get_or_insert(OpenDwell {
                    first: prev_idx,
                    last: cur_idx,
                });
                dwell.last = cur_idx;
            }
            if let Some(first) = open_trip.take() {
                out.trips.push(span(samples, first, prev_idx));
            }
        } else {
            if let Some(dwell) = open_dwell.take() {
                out.dwells.push(span(samples, dwell.first, dwell.last));
            }
            open_trip.get_or_insert(prev_idx);
        }
    }

    let last_idx = samples.len() - 1;
    if let Some(first) = open_trip {
        out.trips.push(span(samples, first, last_idx));
    }
    if let Some(dwell) = open_dwell {
        out.dwells.push(span(samples, dwell.first, dwell.last));
    }

    tracing::trace!(
        device = %samples[0].device_id,
        samples = samples.len(),
        trips = out.trips.len(),
        dwells = out.dwells.len(),
        "segmented device"
    );

    Ok(out)
}

/// Segment every device, in parallel. Output follows device order.
pub fn segment_all<'a>(
    traces: &'a Traces,
    thresholds: &Thresholds,
    metric: DistanceMetric,
) -> Result<Vec<DeviceSegmentation<'a>>> {
    traces
        .devices
        .par_iter()
        .map(|trace| -> Result<DeviceSegmentation<'a>> {
            Ok(DeviceSegmentation {
                trace,
                segmentation: segment_device(&trace.samples, thresholds, metric)?,
            })
        })
        .collect()
}

fn span(samples: &[LocationSample], first: usize, last: usize) -> Segment {
    Segment {
        start: samples[first].timestamp,
        end: samples[last].timestamp,
        first,
        last,
    }
}

fn elapsed_seconds(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).as_seconds_f64()
}
