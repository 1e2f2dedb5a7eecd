//! Effective gait: both limbs of a wearer moving effectively at once.

use std::collections::BTreeMap;

use crate::interval::Span;
use crate::types::{EffectiveMovementInterval, GaitInterval, Limb, LimbPair};

/// Every positive-length overlap between a wearer's left and right
/// effective movement intervals.
///
/// Wearers with intervals on only one limb contribute nothing. Output is
/// ordered by wearer, then start and end.
pub fn detect_effective_gait(intervals: &[EffectiveMovementInterval]) -> Vec<GaitInterval> {
    let mut by_wearer: BTreeMap<&str, LimbPair<Vec<Span>>> = BTreeMap::new();
    for m in intervals {
        let limbs = by_wearer
            .entry(m.wearer.as_str())
            .or_insert_with(|| LimbPair::new(Vec::new(), Vec::new()));
        let span = Span::new(m.start_time, m.end_time);
        match m.limb {
            Limb::Left => limbs.left.push(span),
            Limb::Right => limbs.right.push(span),
        }
    }

    let mut gait = Vec::new();
    for (wearer, limbs) in &by_wearer {
        if limbs.left.is_empty() || limbs.right.is_empty() {
            log::debug!("{}: effective movement on one limb only", wearer);
            continue;
        }
        let mut overlaps: Vec<Span> = limbs
            .left
            .iter()
            .flat_map(|l| limbs.right.iter().filter_map(move |r| l.overlap(r)))
            .collect();
        overlaps.sort();
        gait.extend(
            overlaps
                .into_iter()
                .map(|span| GaitInterval::new(wearer, span.start, span.end)),
        );
    }
    gait
}
