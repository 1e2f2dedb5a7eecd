//! Pipeline configuration, read once from a JSON file.
//!
//! ```json
//! {
//!   "telemetry": { "path": "data/samples.json.gz" },
//!   "store": { "dir": "data/tables" },
//!   "activity": { "gap_threshold_secs": 80 },
//!   "movement": {
//!     "sampling_rate_hz": 50,
//!     "accel": { "band_min_hz": 0.5, "band_max_hz": 3.0, "power_threshold": 0.05,
//!                "activity_threshold": 0.2, "min_hits": 3 },
//!     "gyro":  { "band_min_hz": 0.5, "band_max_hz": 3.0, "power_threshold": 0.05,
//!                "activity_threshold": 0.5, "min_hits": 3 }
//!   },
//!   "time": { "timezone": "Europe/Madrid" }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::signal::{ChannelCriteria, DEFAULT_SEGMENT_LEN};
use crate::timeutils::{offset_from_minutes, LocalZone};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    pub movement: MovementConfig,
    #[serde(default)]
    pub time: TimeConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Sample log, plain or gzip-compressed JSON.
    pub path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON file per table.
    pub dir: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold_secs: f64,
    /// Wearers processed concurrently while segmenting.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: default_gap_threshold(),
            workers: default_workers(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovementConfig {
    pub sampling_rate_hz: f64,
    /// Samples per evaluated window; trailing remainders are dropped.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_merge_gap")]
    pub max_merge_gap_secs: f64,
    pub accel: ChannelCriteria,
    pub gyro: ChannelCriteria,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Offset applied to timestamps written without one, minutes east of UTC.
    #[serde(default)]
    pub naive_offset_minutes: i32,
    /// IANA zone for timestamps written without an offset, e.g.
    /// `Europe/Madrid`. Takes precedence over `naive_offset_minutes`.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl TimeConfig {
    /// Zone for naive timestamps. Falls back to UTC when the configured
    /// values do not resolve; `Config::validate` rejects those up front.
    pub fn local_zone(&self) -> LocalZone {
        if let Some(zone) = self.timezone.as_deref().and_then(LocalZone::named) {
            return zone;
        }
        offset_from_minutes(self.naive_offset_minutes)
            .map(LocalZone::Fixed)
            .unwrap_or_else(LocalZone::utc)
    }
}

fn default_gap_threshold() -> f64 {
    80.0
}

fn default_workers() -> usize {
    1
}

fn default_window_size() -> usize {
    DEFAULT_SEGMENT_LEN
}

fn default_merge_gap() -> f64 {
    10.0
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("activity.gap_threshold_secs", self.activity.gap_threshold_secs)?;
        if self.activity.workers == 0 {
            return Err(invalid("activity.workers", "must be at least 1"));
        }
        if offset_from_minutes(self.time.naive_offset_minutes).is_none() {
            return Err(invalid("time.naive_offset_minutes", "out of range"));
        }
        if let Some(name) = self.time.timezone.as_deref() {
            if LocalZone::named(name).is_none() {
                return Err(invalid("time.timezone", &format!("unknown zone {:?}", name)));
            }
        }
        self.movement.validate()
    }
}

impl MovementConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sampling_rate_hz.is_finite() && self.sampling_rate_hz > 0.0) {
            return Err(invalid("movement.sampling_rate_hz", "must be positive"));
        }
        if self.window_size < 2 {
            return Err(invalid("movement.window_size", "must be at least 2 samples"));
        }
        non_negative("movement.max_merge_gap_secs", self.max_merge_gap_secs)?;
        validate_channel("movement.accel", &self.accel, self.sampling_rate_hz)?;
        validate_channel("movement.gyro", &self.gyro, self.sampling_rate_hz)
    }
}

fn validate_channel(name: &'static str, c: &ChannelCriteria, fs: f64) -> Result<(), ConfigError> {
    non_negative(name, c.band_min_hz)?;
    if !(c.band_max_hz > c.band_min_hz) {
        return Err(invalid(name, "band_max_hz must exceed band_min_hz"));
    }
    if c.band_min_hz > fs / 2.0 {
        return Err(invalid(name, "band starts above the Nyquist frequency"));
    }
    non_negative(name, c.power_threshold)?;
    non_negative(name, c.activity_threshold)?;
    if c.min_run_samples == 0 {
        return Err(invalid(name, "min_run_samples must be at least 1"));
    }
    Ok(())
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, &format!("expected a finite non-negative value, got {}", value)))
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}
