//! Bilateral activity windows from left and right segment sets.
//!
//! Segments are swept in start order. When a segment opens, every segment of
//! the other limb that is still open is a candidate; segments of the other
//! limb that closed before this start can never overlap anything later and
//! are dropped.

use crate::interval::Span;
use crate::types::{normalize_address, ActivitySegment, BilateralWindow, Limb, LimbPair};

/// All positive-length overlaps between `left` and `right` segments.
///
/// Output is ordered by start, end, then left and right input positions.
pub fn intersect(left: &[ActivitySegment], right: &[ActivitySegment]) -> Vec<BilateralWindow> {
    let mut events: Vec<(Limb, usize)> = left
        .iter()
        .enumerate()
        .map(|(i, _)| (Limb::Left, i))
        .chain(right.iter().enumerate().map(|(i, _)| (Limb::Right, i)))
        .collect();
    let sets = LimbPair::new(left, right);
    events.sort_by_key(|&(limb, i)| sets.get(limb)[i].start_time);

    let mut open: LimbPair<Vec<usize>> = LimbPair::new(Vec::new(), Vec::new());
    let mut windows = Vec::new();

    for (limb, i) in events {
        let seg = &sets.get(limb)[i];
        let seg_span = Span::new(seg.start_time, seg.end_time);
        let others = sets.get(limb.opposite());

        let still_open = match limb {
            Limb::Left => &mut open.right,
            Limb::Right => &mut open.left,
        };
        still_open.retain(|&j| others[j].end_time >= seg.start_time);

        for &j in still_open.iter() {
            let other = &others[j];
            let other_span = Span::new(other.start_time, other.end_time);
            if let Some(span) = seg_span.overlap(&other_span) {
                let (l, r) = match limb {
                    Limb::Left => ((i, seg), (j, other)),
                    Limb::Right => ((j, other), (i, seg)),
                };
                windows.push(bilateral_window(span, l, r));
            }
        }

        match limb {
            Limb::Left => open.left.push(i),
            Limb::Right => open.right.push(i),
        }
    }

    windows.sort_by(|a, b| {
        (a.start_time, a.end_time, a.segment_indices.left, a.segment_indices.right).cmp(&(
            b.start_time,
            b.end_time,
            b.segment_indices.left,
            b.segment_indices.right,
        ))
    });
    log::debug!(
        "{} bilateral windows from {} left x {} right segments",
        windows.len(),
        left.len(),
        right.len()
    );
    windows
}

fn bilateral_window(
    span: Span,
    (li, left): (usize, &ActivitySegment),
    (ri, right): (usize, &ActivitySegment),
) -> BilateralWindow {
    BilateralWindow {
        id: None,
        start_time: span.start,
        end_time: span.end,
        segment_indices: LimbPair::new(li, ri),
        segment_ids: LimbPair::new(left.id, right.id),
        wearers: LimbPair::new(left.wearer.clone(), right.wearer.clone()),
        addresses: LimbPair::new(normalize_address(&left.address), normalize_address(&right.address)),
        device_names: LimbPair::new(left.device_name.clone(), right.device_name.clone()),
        duration: span.duration_secs(),
        is_effective: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn seg(limb: Limb, start: i64, end: i64) -> ActivitySegment {
        ActivitySegment {
            id: Some(start * 1000 + end),
            wearer: "W-7".to_string(),
            limb,
            device_name: format!("{}-dev", limb),
            address: "DEV-0011223344AA".to_string(),
            start_time: at(start),
            end_time: at(end),
            duration: (end - start) as f64,
            sample_count: 1,
        }
    }

    /// Reference pairwise definition.
    fn naive(left: &[ActivitySegment], right: &[ActivitySegment]) -> Vec<(usize, usize, i64, i64)> {
        let mut out = Vec::new();
        for (i, a) in left.iter().enumerate() {
            for (j, b) in right.iter().enumerate() {
                if a.start_time <= b.end_time && b.start_time <= a.end_time {
                    let s = a.start_time.max(b.start_time);
                    let e = a.end_time.min(b.end_time);
                    if e > s {
                        out.push((i, j, s.timestamp(), e.timestamp()));
                    }
                }
            }
        }
        out.sort();
        out
    }

    fn keys(windows: &[BilateralWindow]) -> Vec<(usize, usize, i64, i64)> {
        let mut out: Vec<_> = windows
            .iter()
            .map(|w| {
                (
                    w.segment_indices.left,
                    w.segment_indices.right,
                    w.start_time.timestamp(),
                    w.end_time.timestamp(),
                )
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_simple_overlap() {
        let left = vec![seg(Limb::Left, 0, 600)];
        let right = vec![seg(Limb::Right, 300, 1200)];
        let windows = intersect(&left, &right);

        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!((w.start_time, w.end_time), (at(300), at(600)));
        assert_eq!(w.duration, 300.0);
        assert_eq!(w.segment_ids, LimbPair::new(Some(600), Some(301_200)));
        assert_eq!(w.device_names.left, "Left-dev");
        assert_eq!(w.device_names.right, "Right-dev");
        assert_eq!(w.addresses.left, "00:11:22:33:44:AA");
        assert!(!w.is_effective);
    }

    #[test]
    fn test_no_overlap_is_empty() {
        let left = vec![seg(Limb::Left, 0, 10)];
        let right = vec![seg(Limb::Right, 10, 20), seg(Limb::Right, 30, 40)];
        assert!(intersect(&left, &right).is_empty());
        assert!(intersect(&[], &right).is_empty());
    }

    #[test]
    fn test_degenerate_segment_never_yields_window() {
        let left = vec![seg(Limb::Left, 5, 5)];
        let right = vec![seg(Limb::Right, 0, 10)];
        assert!(intersect(&left, &right).is_empty());
    }

    #[test]
    fn test_matches_cross_product() {
        let left = vec![
            seg(Limb::Left, 0, 50),
            seg(Limb::Left, 40, 45),
            seg(Limb::Left, 60, 200),
            seg(Limb::Left, 210, 220),
            seg(Limb::Left, 500, 500),
            seg(Limb::Left, 5, 300),
        ];
        let right = vec![
            seg(Limb::Right, 10, 20),
            seg(Limb::Right, 45, 70),
            seg(Limb::Right, 199, 215),
            seg(Limb::Right, 230, 240),
            seg(Limb::Right, 490, 510),
            seg(Limb::Right, 0, 1000),
        ];
        let windows = intersect(&left, &right);
        assert_eq!(keys(&windows), naive(&left, &right));

        let swapped = intersect(&right, &left);
        assert_eq!(windows.len(), swapped.len());
    }

    #[test]
    fn test_output_ordered_by_start() {
        let left = vec![seg(Limb::Left, 100, 200), seg(Limb::Left, 0, 50)];
        let right = vec![seg(Limb::Right, 0, 300)];
        let windows = intersect(&left, &right);
        assert_eq!(windows.len(), 2);
        assert!(windows[0].start_time < windows[1].start_time);
        assert_eq!(windows[0].segment_indices.left, 1);
    }
}
