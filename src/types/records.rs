//! Records produced by the detection stages, one per table kind.

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Limb, LimbPair};
use crate::timeutils::seconds_between;

/// Contiguous stretch of samples from one limb.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivitySegment {
    /// Assigned by the record store on persistence.
    #[serde(default)]
    pub id: Option<i64>,
    pub wearer: String,
    pub limb: Limb,
    pub device_name: String,
    pub address: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: f64,
    pub sample_count: usize,
}

/// Overlap between a left-limb and a right-limb segment of one wearer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BilateralWindow {
    #[serde(default)]
    pub id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Positions of the source segments in the intersected inputs.
    pub segment_indices: LimbPair<usize>,
    /// Persisted ids of the source segments, when they had been stored.
    pub segment_ids: LimbPair<Option<i64>>,
    pub wearers: LimbPair<String>,
    pub addresses: LimbPair<String>,
    pub device_names: LimbPair<String>,
    pub duration: f64,
    #[serde(default)]
    pub is_effective: bool,
}

impl BilateralWindow {
    /// One detector input row per limb.
    pub fn limb_windows(&self) -> [LimbWindow; 2] {
        Limb::BOTH.map(|limb| LimbWindow {
            wearer: self.wearers.get(limb).clone(),
            limb,
            start_time: Some(self.start_time.to_rfc3339_opts(SecondsFormat::Micros, true)),
            end_time: Some(self.end_time.to_rfc3339_opts(SecondsFormat::Micros, true)),
        })
    }

    pub fn wearer_matches(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.wearers.left) || pattern.is_match(&self.wearers.right)
    }

    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time <= end && self.end_time >= start
    }
}

/// Input row for the movement detector.
///
/// Timestamps stay textual so that a malformed row only costs that row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimbWindow {
    pub wearer: String,
    pub limb: Limb,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectiveMovementInterval {
    pub wearer: String,
    pub limb: Limb,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: f64,
}

impl EffectiveMovementInterval {
    pub fn new(wearer: &str, limb: Limb, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            wearer: wearer.to_string(),
            limb,
            start_time,
            end_time,
            duration: seconds_between(start_time, end_time),
        }
    }
}

/// Both limbs of one wearer moving effectively at the same time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaitInterval {
    pub wearer: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: f64,
}

impl GaitInterval {
    pub fn new(wearer: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            wearer: wearer.to_string(),
            start_time,
            end_time,
            duration: seconds_between(start_time, end_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(left: &str, right: &str) -> BilateralWindow {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 30).unwrap();
        BilateralWindow {
            id: None,
            start_time: start,
            end_time: end,
            segment_indices: LimbPair::new(0, 0),
            segment_ids: LimbPair::new(None, None),
            wearers: LimbPair::new(left.to_string(), right.to_string()),
            addresses: LimbPair::new("AA:01".to_string(), "AA:02".to_string()),
            device_names: LimbPair::new("l".to_string(), "r".to_string()),
            duration: 30.0,
            is_effective: false,
        }
    }

    #[test]
    fn test_anchored_pattern_matches_whole_identity() {
        let exact = Regex::new("^A$").unwrap();
        assert!(window("A", "A").wearer_matches(&exact));
        assert!(!window("AB", "AB").wearer_matches(&exact));

        let unanchored = Regex::new("A").unwrap();
        assert!(window("AB", "AB").wearer_matches(&unanchored));
    }

    #[test]
    fn test_pattern_checks_either_limb() {
        let pattern = Regex::new(r"^W-\d+$").unwrap();
        assert!(window("W-12", "other").wearer_matches(&pattern));
        assert!(window("other", "W-7").wearer_matches(&pattern));
        assert!(!window("W-x", "other").wearer_matches(&pattern));
    }

    #[test]
    fn test_limb_windows_carry_bounds() {
        let [left, right] = window("A", "B").limb_windows();
        assert_eq!(left.limb, Limb::Left);
        assert_eq!(left.wearer, "A");
        assert_eq!(right.wearer, "B");
        assert_eq!(left.start_time.as_deref(), Some("2024-05-01T10:00:00.000000Z"));
    }
}
