//! Closed time spans, their intersection and gap-tolerant merging.

use chrono::{DateTime, Duration, Utc};

use crate::timeutils::seconds_between;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Span {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Span { start, end }
    }

    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.start, self.end)
    }

    /// Closed-interval test: `a.start <= b.end && b.start <= a.end`.
    pub fn touches(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// `[max(starts), min(ends)]` when that window has positive length.
    ///
    /// Spans that only share an endpoint touch but yield `None`.
    pub fn overlap(&self, other: &Span) -> Option<Span> {
        if !self.touches(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Span { start, end })
    }
}

/// Greedy merge of spans whose gaps are at most `max_gap`.
///
/// Input order does not matter; output is sorted by start and contains no
/// two spans closer than `max_gap`, so merging the output again is a no-op.
pub fn merge_spans(mut spans: Vec<Span>, max_gap: Duration) -> Vec<Span> {
    spans.sort();

    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(current) if span.start - current.end <= max_gap => {
                if span.end > current.end {
                    current.end = span.end;
                }
            }
            _ => merged.push(span),
        }
    }
    merged
}

/// Seconds to a `chrono::Duration` at microsecond resolution.
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::microseconds((secs * 1_000_000.0).round() as i64)
}
