//! Effective movement detection over per-limb activity windows.
//!
//! Each window's samples are reduced to acceleration and angular-rate
//! magnitudes, cut into fixed-length slices and scored per slice. Passing
//! slices are merged into intervals when the gap between them is small.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use ndarray::{s, Array2};

use crate::config::MovementConfig;
use crate::interval::{duration_from_secs, merge_spans, Span};
use crate::signal::{SignalWindowEvaluator, DEFAULT_SEGMENT_LEN};
use crate::store::{export_slice, TelemetrySource, WindowSink};
use crate::timeutils::{parse_optional, LocalZone};
use crate::types::{EffectiveMovementInterval, Limb, LimbWindow, Sample};
use crate::validation::partition_valid;

/// Why one input row contributed nothing, or only partially.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub wearer: String,
    pub limb: Limb,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.wearer, self.limb, self.message)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MovementReport {
    pub intervals: Vec<EffectiveMovementInterval>,
    pub diagnostics: Vec<Diagnostic>,
    pub windows_evaluated: usize,
    pub windows_passed: usize,
}

pub struct EffectiveMovementDetector {
    accel: SignalWindowEvaluator,
    gyro: SignalWindowEvaluator,
    window_size: usize,
    max_merge_gap: Duration,
    local_zone: LocalZone,
}

impl EffectiveMovementDetector {
    pub fn new(config: &MovementConfig, local_zone: LocalZone) -> Self {
        let rate = config.sampling_rate_hz;
        EffectiveMovementDetector {
            accel: SignalWindowEvaluator::new(rate, DEFAULT_SEGMENT_LEN, config.accel.clone()),
            gyro: SignalWindowEvaluator::new(rate, DEFAULT_SEGMENT_LEN, config.gyro.clone()),
            window_size: config.window_size,
            max_merge_gap: duration_from_secs(config.max_merge_gap_secs),
            local_zone,
        }
    }

    pub fn detect(
        &self,
        windows: &[LimbWindow],
        telemetry: &dyn TelemetrySource,
        mut sink: Option<&mut dyn WindowSink>,
    ) -> MovementReport {
        let mut report = MovementReport::default();

        for row in windows {
            let start = parse_optional(row.start_time.as_deref(), self.local_zone);
            let end = parse_optional(row.end_time.as_deref(), self.local_zone);
            let (start, end) = match (start, end) {
                (Ok(s), Ok(e)) => (s, e),
                (Err(err), _) | (_, Err(err)) => {
                    note(&mut report, row, format!("skipping window: {}", err));
                    continue;
                }
            };
            if start >= end {
                note(&mut report, row, format!("skipping window: start {} is not before end {}", start, end));
                continue;
            }

            let samples = match telemetry.fetch_samples(&row.wearer, row.limb, start, end) {
                Ok(samples) => samples,
                Err(err) => {
                    note(&mut report, row, format!("skipping window: {}", err));
                    continue;
                }
            };
            if samples.is_empty() {
                log::debug!("{} {}: no samples in [{}, {}]", row.wearer, row.limb, start, end);
                continue;
            }

            if let Some(sink) = sink.as_deref_mut() {
                if let Err(err) = export_slice(sink, &row.wearer, row.limb, start, &samples) {
                    note(&mut report, row, format!("export failed: {}", err));
                }
            }

            let (times, magnitudes) = match magnitude_matrix(&samples) {
                Some(m) => m,
                None => {
                    note(&mut report, row, "skipping window: samples lack accelerometer or gyroscope axes".to_string());
                    continue;
                }
            };

            let scan = self.scan(&times, &magnitudes);
            report.windows_evaluated += scan.evaluated;
            report.windows_passed += scan.passing.len();

            let intervals: Vec<EffectiveMovementInterval> = merge_spans(scan.passing, self.max_merge_gap)
                .into_iter()
                .filter(|span| span.start < span.end)
                .map(|span| EffectiveMovementInterval::new(&row.wearer, row.limb, span.start, span.end))
                .collect();

            let (valid, rejected) = partition_valid(intervals);
            for err in rejected {
                note(&mut report, row, format!("dropping interval: {}", err));
            }
            report.intervals.extend(valid);
        }

        log::info!(
            "{} of {} slices passed, {} effective movement intervals",
            report.windows_passed,
            report.windows_evaluated,
            report.intervals.len()
        );
        report
    }

    /// Score every complete slice of `window_size` samples. The trailing
    /// remainder is not evaluated.
    fn scan(&self, times: &[DateTime<Utc>], magnitudes: &Array2<f64>) -> Scan {
        let w = self.window_size;
        let evaluated = times.len() / w;
        let mut passing = Vec::new();

        for k in 0..evaluated {
            let rows = k * w..(k + 1) * w;
            let accel = self.accel.evaluate(magnitudes.slice(s![rows.clone(), 0]));
            let verdict = accel.passed() || self.gyro.evaluate(magnitudes.slice(s![rows.clone(), 1])).passed();
            if verdict {
                passing.push(Span::new(times[rows.start], times[rows.end - 1]));
            }
        }
        Scan { evaluated, passing }
    }
}

struct Scan {
    evaluated: usize,
    passing: Vec<Span>,
}

fn note(report: &mut MovementReport, row: &LimbWindow, message: String) {
    log::warn!("{} {}: {}", row.wearer, row.limb, message);
    report.diagnostics.push(Diagnostic {
        wearer: row.wearer.clone(),
        limb: row.limb,
        message,
    });
}

/// Time-ordered sample times and an `N x 2` matrix of `(|a|, |g|)`.
/// `None` when any sample misses an axis.
fn magnitude_matrix(samples: &[Sample]) -> Option<(Vec<DateTime<Utc>>, Array2<f64>)> {
    let mut ordered: Vec<&Sample> = samples.iter().collect();
    ordered.sort_by_key(|s| s.timestamp);

    let mut magnitudes = Array2::<f64>::zeros((ordered.len(), 2));
    for (i, sample) in ordered.iter().enumerate() {
        let (a, g) = sample.channels.magnitudes()?;
        magnitudes[[i, 0]] = a;
        magnitudes[[i, 1]] = g;
    }
    let times = ordered.iter().map(|s| s.timestamp).collect();
    Some((times, magnitudes))
}

/// Run the detector configured by `config` over `windows`.
pub fn detect_effective_movement(
    windows: &[LimbWindow],
    telemetry: &dyn TelemetrySource,
    config: &MovementConfig,
    local_zone: LocalZone,
    sink: Option<&mut dyn WindowSink>,
) -> MovementReport {
    EffectiveMovementDetector::new(config, local_zone).detect(windows, telemetry, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::{ExportError, FetchError};
    use crate::store::SampleLog;
    use crate::types::Channels;
    use chrono::{SecondsFormat, TimeZone};
    use std::f64::consts::PI;

    const RATE: f64 = 50.0;

    fn movement_config(window_size: usize) -> MovementConfig {
        let mut config = Config::from_json_str(crate::config::tests::SAMPLE_CONFIG)
            .unwrap()
            .movement;
        config.window_size = window_size;
        config
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn at_sample(i: usize) -> DateTime<Utc> {
        t0() + Duration::milliseconds((i as f64 * 1000.0 / RATE) as i64)
    }

    fn text(ts: DateTime<Utc>) -> Option<String> {
        Some(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Gravity-free stride at 1 Hz; both magnitudes dip to zero twice a stride.
    fn walking(i: usize) -> Channels {
        let phase = 2.0 * PI * i as f64 / RATE;
        Channels::full([0.0, 0.0, 3.0 * phase.sin()], [0.0, 2.0 * phase.cos(), 0.0])
    }

    fn still(_: usize) -> Channels {
        Channels::full([0.0, 0.0, 9.8], [0.0, 0.0, 0.0])
    }

    fn samples(range: std::ops::Range<usize>, channels: fn(usize) -> Channels) -> Vec<Sample> {
        range
            .map(|i| Sample {
                timestamp: at_sample(i),
                limb: Limb::Left,
                wearer: "W-1".into(),
                device_name: "dev".into(),
                address: "AA:BB".into(),
                channels: channels(i),
            })
            .collect()
    }

    fn row(start: DateTime<Utc>, end: DateTime<Utc>) -> LimbWindow {
        LimbWindow {
            wearer: "W-1".into(),
            limb: Limb::Left,
            start_time: text(start),
            end_time: text(end),
        }
    }

    fn detect(log: &SampleLog, rows: &[LimbWindow], window_size: usize) -> MovementReport {
        detect_effective_movement(rows, log, &movement_config(window_size), LocalZone::utc(), None)
    }

    #[test]
    fn test_flat_slice_is_not_effective() {
        let log = SampleLog::from_samples(samples(0..256, still));
        let report = detect(&log, &[row(at_sample(0), at_sample(255))], 256);
        assert_eq!(report.windows_evaluated, 1);
        assert_eq!(report.windows_passed, 0);
        assert!(report.intervals.is_empty());
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_walking_slice_is_effective() {
        let log = SampleLog::from_samples(samples(0..256, walking));
        let report = detect(&log, &[row(at_sample(0), at_sample(255))], 256);
        assert_eq!(report.windows_passed, 1);
        assert_eq!(report.intervals.len(), 1);
        assert_eq!(report.intervals[0].start_time, at_sample(0));
        assert_eq!(report.intervals[0].end_time, at_sample(255));
    }

    fn gyro_only(i: usize) -> Channels {
        let phase = 2.0 * PI * i as f64 / RATE;
        Channels::full([0.0, 0.0, 9.8], [0.0, 2.0 * phase.cos(), 0.0])
    }

    fn accel_only(i: usize) -> Channels {
        let phase = 2.0 * PI * i as f64 / RATE;
        Channels::full([0.0, 0.0, 3.0 * phase.sin()], [0.0, 0.0, 0.0])
    }

    fn passed_with(channels: fn(usize) -> Channels, config: &MovementConfig) -> usize {
        let log = SampleLog::from_samples(samples(0..256, channels));
        let rows = [row(at_sample(0), at_sample(255))];
        detect_effective_movement(&rows, &log, config, LocalZone::utc(), None).windows_passed
    }

    #[test]
    fn test_gyro_alone_makes_slice_effective() {
        assert_eq!(passed_with(gyro_only, &movement_config(256)), 1);
    }

    #[test]
    fn test_accel_alone_makes_slice_effective() {
        assert_eq!(passed_with(accel_only, &movement_config(256)), 1);
    }

    #[test]
    fn test_either_channel_threshold_can_fail_alone() {
        let mut quiet_gyro = movement_config(256);
        quiet_gyro.gyro.activity_threshold = 5.0;
        assert_eq!(passed_with(walking, &quiet_gyro), 1);

        let mut quiet_accel = movement_config(256);
        quiet_accel.accel.activity_threshold = 5.0;
        assert_eq!(passed_with(walking, &quiet_accel), 1);

        let mut both = movement_config(256);
        both.accel.activity_threshold = 5.0;
        both.gyro.activity_threshold = 5.0;
        assert_eq!(passed_with(walking, &both), 0);
    }

    #[test]
    fn test_remainder_is_not_evaluated() {
        let log = SampleLog::from_samples(samples(0..700, walking));
        let report = detect(&log, &[row(at_sample(0), at_sample(699))], 256);
        assert_eq!(report.windows_evaluated, 2);
        assert_eq!(report.intervals.len(), 1);
        assert_eq!(report.intervals[0].end_time, at_sample(511));
    }

    #[test]
    fn test_close_slices_merge_distant_ones_do_not() {
        // walk, still, walk, then a pause longer than the merge gap
        let mut all = samples(0..128, walking);
        all.extend(samples(128..256, still));
        all.extend(samples(256..384, walking));
        all.extend(samples(1500..1628, walking));
        let log = SampleLog::from_samples(all);

        let report = detect(&log, &[row(at_sample(0), at_sample(1627))], 128);
        assert_eq!(report.windows_evaluated, 4);
        assert_eq!(report.windows_passed, 3);
        let spans: Vec<_> = report.intervals.iter().map(|m| (m.start_time, m.end_time)).collect();
        assert_eq!(
            spans,
            vec![(at_sample(0), at_sample(383)), (at_sample(1500), at_sample(1627))]
        );
    }

    #[test]
    fn test_bad_rows_are_skipped_with_diagnostics() {
        let log = SampleLog::from_samples(samples(0..256, walking));
        let rows = vec![
            LimbWindow {
                start_time: Some("yesterday-ish".into()),
                ..row(at_sample(0), at_sample(255))
            },
            LimbWindow {
                end_time: None,
                ..row(at_sample(0), at_sample(255))
            },
            row(at_sample(255), at_sample(0)),
            row(at_sample(0), at_sample(255)),
        ];
        let report = detect(&log, &rows, 256);
        assert_eq!(report.diagnostics.len(), 3);
        assert_eq!(report.intervals.len(), 1);
    }

    #[test]
    fn test_missing_axis_skips_window() {
        let mut rows = samples(0..256, walking);
        rows[17].channels.gy = None;
        let log = SampleLog::from_samples(rows);
        let report = detect(&log, &[row(at_sample(0), at_sample(255))], 256);
        assert_eq!(report.windows_evaluated, 0);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("axes"));
    }

    struct Offline;

    impl TelemetrySource for Offline {
        fn fetch_samples(
            &self,
            _: &str,
            _: Limb,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<Sample>, FetchError> {
            Err(FetchError::Unavailable("connection refused".into()))
        }

        fn fetch_wearer_samples(
            &self,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<Sample>, FetchError> {
            Err(FetchError::Unavailable("connection refused".into()))
        }

        fn wearers_in_range(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<String>, FetchError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_fetch_error_skips_window() {
        let report = detect_effective_movement(
            &[row(at_sample(0), at_sample(255))],
            &Offline,
            &movement_config(256),
            LocalZone::utc(),
            None,
        );
        assert!(report.intervals.is_empty());
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("connection refused"));
    }

    struct BrokenSink;

    impl WindowSink for BrokenSink {
        fn export(&mut self, _: &str, _: &[Sample]) -> Result<(), ExportError> {
            Err(ExportError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
    }

    #[test]
    fn test_export_failure_does_not_change_results() {
        let log = SampleLog::from_samples(samples(0..256, walking));
        let mut sink = BrokenSink;
        let report = detect_effective_movement(
            &[row(at_sample(0), at_sample(255))],
            &log,
            &movement_config(256),
            LocalZone::utc(),
            Some(&mut sink),
        );
        assert_eq!(report.intervals.len(), 1);
        assert_eq!(report.diagnostics.len(), 1);
    }
}
