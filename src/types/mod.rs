pub mod records;

pub use records::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the body a sensor is strapped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Limb {
    Left,
    Right,
}

impl Limb {
    pub const BOTH: [Limb; 2] = [Limb::Left, Limb::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Limb::Left => "Left",
            Limb::Right => "Right",
        }
    }

    pub fn opposite(&self) -> Limb {
        match self {
            Limb::Left => Limb::Right,
            Limb::Right => Limb::Left,
        }
    }
}

impl fmt::Display for Limb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per limb.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimbPair<T> {
    pub left: T,
    pub right: T,
}

impl<T> LimbPair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, limb: Limb) -> &T {
        match limb {
            Limb::Left => &self.left,
            Limb::Right => &self.right,
        }
    }
}

/// Six-axis IMU channels. Any axis may be missing from the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Channels {
    pub ax: Option<f64>,
    pub ay: Option<f64>,
    pub az: Option<f64>,
    pub gx: Option<f64>,
    pub gy: Option<f64>,
    pub gz: Option<f64>,
}

impl Channels {
    pub fn full(accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Self {
            ax: Some(accel[0]),
            ay: Some(accel[1]),
            az: Some(accel[2]),
            gx: Some(gyro[0]),
            gy: Some(gyro[1]),
            gz: Some(gyro[2]),
        }
    }

    /// `(|a|, |g|)`, or `None` when an axis is missing.
    pub fn magnitudes(&self) -> Option<(f64, f64)> {
        let (ax, ay, az) = (self.ax?, self.ay?, self.az?);
        let (gx, gy, gz) = (self.gx?, self.gy?, self.gz?);
        Some((
            (ax * ax + ay * ay + az * az).sqrt(),
            (gx * gx + gy * gy + gz * gz).sqrt(),
        ))
    }
}

/// A raw telemetry row as returned by the telemetry store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub limb: Limb,
    pub wearer: String,
    pub device_name: String,
    pub address: String,
    #[serde(flatten)]
    pub channels: Channels,
}

/// Bring a hardware address into colon-delimited form.
///
/// Addresses that already contain `:` are returned unchanged. Otherwise the
/// text after the last `-` is split into two-character groups.
pub fn normalize_address(address: &str) -> String {
    if address.contains(':') {
        return address.to_string();
    }
    let hex_part = address.rsplit('-').next().unwrap_or(address);
    let chars: Vec<char> = hex_part.chars().collect();
    chars
        .chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
}

pub fn is_normalized_address(address: &str) -> bool {
    address.is_empty() || address.contains(':') || address.chars().count() <= 2
}
