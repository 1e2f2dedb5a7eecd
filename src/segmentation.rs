//! Contiguous activity segments for a single limb.
//!
//! A segment closes when the gap to the next sample exceeds the threshold
//! or when the reporting device changes, whichever comes first.

use chrono::{DateTime, Utc};

use crate::interval::duration_from_secs;
use crate::timeutils::seconds_between;
use crate::types::{normalize_address, ActivitySegment, Limb, Sample};

/// Group `limb`'s samples into activity segments.
///
/// Samples of the other limb are ignored. The input need not be sorted; a
/// stable sort keeps arrival order for equal timestamps.
pub fn build_segments(
    samples: &[Sample],
    gap_threshold_secs: f64,
    limb: Limb,
) -> Vec<ActivitySegment> {
    let mut ordered: Vec<&Sample> = samples.iter().filter(|s| s.limb == limb).collect();
    if ordered.is_empty() {
        return Vec::new();
    }
    ordered.sort_by_key(|s| s.timestamp);

    let gap = duration_from_secs(gap_threshold_secs);
    let mut segments = Vec::new();
    let mut first = ordered[0];
    let mut last = ordered[0];
    let mut count = 1usize;

    for sample in ordered.into_iter().skip(1) {
        let split = sample.timestamp - last.timestamp > gap || sample.device_name != last.device_name;
        if split {
            segments.push(close_segment(first, last.timestamp, count));
            first = sample;
            count = 0;
        }
        last = sample;
        count += 1;
    }
    segments.push(close_segment(first, last.timestamp, count));

    log::debug!(
        "{} segments for limb {} from {} samples",
        segments.len(),
        limb,
        samples.len()
    );
    segments
}

fn close_segment(first: &Sample, end_time: DateTime<Utc>, sample_count: usize) -> ActivitySegment {
    ActivitySegment {
        id: None,
        wearer: first.wearer.clone(),
        limb: first.limb,
        device_name: first.device_name.clone(),
        address: normalize_address(&first.address),
        start_time: first.timestamp,
        end_time,
        duration: seconds_between(first.timestamp, end_time),
        sample_count,
    }
}
