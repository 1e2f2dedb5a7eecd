use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::welch::WelchEstimator;

/// Below this standard deviation a slice is flat and cannot be active.
pub const FLAT_SIGNAL_STD: f64 = 0.01;

/// Pass criteria for one magnitude channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelCriteria {
    pub band_min_hz: f64,
    pub band_max_hz: f64,
    /// Minimum summed PSD inside the band.
    pub power_threshold: f64,
    /// `|x|` above this marks a sample active.
    pub activity_threshold: f64,
    /// Required number of distinct qualifying active runs.
    pub min_hits: usize,
    /// Shortest run (in samples) that counts as a hit.
    #[serde(default = "default_min_run_samples")]
    pub min_run_samples: usize,
}

fn default_min_run_samples() -> usize {
    1
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelVerdict {
    pub band_power: f64,
    pub spectral_pass: bool,
    /// `None` when the slice was rejected as flat before run counting.
    pub qualifying_runs: Option<usize>,
    pub duration_pass: bool,
}

impl ChannelVerdict {
    pub fn passed(&self) -> bool {
        self.spectral_pass && self.duration_pass
    }
}

/// Scores fixed-length magnitude slices of one channel.
pub struct SignalWindowEvaluator {
    estimator: WelchEstimator,
    criteria: ChannelCriteria,
}

impl SignalWindowEvaluator {
    pub fn new(sampling_rate: f64, segment_len: usize, criteria: ChannelCriteria) -> Self {
        SignalWindowEvaluator {
            estimator: WelchEstimator::new(sampling_rate, segment_len),
            criteria,
        }
    }

    pub fn evaluate(&self, slice: ArrayView1<f64>) -> ChannelVerdict {
        let band_power = self.band_power(slice);
        let qualifying_runs = self.qualifying_runs(slice);
        ChannelVerdict {
            band_power,
            spectral_pass: band_power >= self.criteria.power_threshold,
            qualifying_runs,
            duration_pass: qualifying_runs.map_or(false, |runs| runs >= self.criteria.min_hits),
        }
    }

    fn band_power(&self, slice: ArrayView1<f64>) -> f64 {
        let psd = match slice.as_slice() {
            Some(contiguous) => self.estimator.estimate(contiguous),
            None => self.estimator.estimate(&slice.to_vec()),
        };
        psd.band_power(self.criteria.band_min_hz, self.criteria.band_max_hz)
    }

    fn qualifying_runs(&self, slice: ArrayView1<f64>) -> Option<usize> {
        if slice.is_empty() || slice.std(0.0) < FLAT_SIGNAL_STD {
            return None;
        }
        let active = slice.mapv(|x| x.abs() > self.criteria.activity_threshold);
        let runs = active_runs(active.iter().copied());
        Some(
            runs.into_iter()
                .filter(|&len| len >= self.criteria.min_run_samples)
                .count(),
        )
    }
}

/// Lengths of maximal runs of `true`.
pub fn active_runs(mask: impl IntoIterator<Item = bool>) -> Vec<usize> {
    let mut runs = Vec::new();
    let mut current = 0usize;
    for active in mask {
        if active {
            current += 1;
        } else if current > 0 {
            runs.push(current);
            current = 0;
        }
    }
    if current > 0 {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use std::f64::consts::PI;

    fn criteria() -> ChannelCriteria {
        ChannelCriteria {
            band_min_hz: 0.5,
            band_max_hz: 3.0,
            power_threshold: 0.01,
            activity_threshold: 0.5,
            min_hits: 2,
            min_run_samples: 1,
        }
    }

    fn evaluator(c: ChannelCriteria) -> SignalWindowEvaluator {
        SignalWindowEvaluator::new(50.0, 256, c)
    }

    fn walking_like(n: usize) -> Array1<f64> {
        // 1.5 Hz stride oscillation sampled at 50 Hz
        Array1::from_iter((0..n).map(|i| (2.0 * PI * 1.5 * i as f64 / 50.0).sin()))
    }

    #[test]
    fn test_flat_slice_fails_duration() {
        let flat = Array1::from_elem(256, 9.81);
        let verdict = evaluator(criteria()).evaluate(flat.view());
        assert_eq!(verdict.qualifying_runs, None);
        assert!(!verdict.duration_pass);
        assert!(!verdict.passed());
    }

    #[test]
    fn test_flat_fails_even_with_zero_power_threshold() {
        let mut c = criteria();
        c.power_threshold = 0.0;
        let verdict = evaluator(c).evaluate(Array1::from_elem(256, 1.0).view());
        assert!(verdict.spectral_pass);
        assert!(!verdict.passed());
    }

    #[test]
    fn test_oscillation_passes_both_tests() {
        let verdict = evaluator(criteria()).evaluate(walking_like(256).view());
        assert!(verdict.spectral_pass, "band power {}", verdict.band_power);
        assert!(verdict.qualifying_runs.unwrap() >= 2);
        assert!(verdict.passed());
    }

    #[test]
    fn test_out_of_band_energy_fails_spectral() {
        let mut c = criteria();
        c.band_min_hz = 10.0;
        c.band_max_hz = 20.0;
        let verdict = evaluator(c).evaluate(walking_like(256).view());
        assert!(!verdict.spectral_pass);
        assert!(verdict.duration_pass);
        assert!(!verdict.passed());
    }

    #[test]
    fn test_counts_runs_not_duration() {
        // One long active stretch: plenty of active samples, a single run.
        let mut data = vec![0.0; 256];
        for v in data.iter_mut().take(200).skip(20) {
            *v = 1.0;
        }
        let mut c = criteria();
        c.power_threshold = 0.0;
        let verdict = evaluator(c).evaluate(Array1::from(data).view());
        assert_eq!(verdict.qualifying_runs, Some(1));
        assert!(!verdict.duration_pass);
    }

    #[test]
    fn test_negative_values_count_as_active() {
        let data: Vec<f64> = (0..256)
            .map(|i| if (i / 16) % 2 == 0 { -1.0 } else { 0.0 })
            .collect();
        let mut c = criteria();
        c.power_threshold = 0.0;
        let verdict = evaluator(c).evaluate(Array1::from(data).view());
        assert_eq!(verdict.qualifying_runs, Some(8));
        assert!(verdict.passed());
    }

    #[test]
    fn test_min_run_samples_filters_blips() {
        let mut data = vec![0.0; 256];
        data[10] = 1.0;
        data[50] = 1.0;
        for v in data.iter_mut().take(120).skip(100) {
            *v = 1.0;
        }
        let mut c = criteria();
        c.power_threshold = 0.0;
        c.min_run_samples = 5;
        let verdict = evaluator(c).evaluate(Array1::from(data).view());
        assert_eq!(verdict.qualifying_runs, Some(1));
    }

    #[test]
    fn test_active_runs() {
        assert_eq!(active_runs([true, true, false, true]), vec![2, 1]);
        assert_eq!(active_runs([false, false]), Vec::<usize>::new());
        assert_eq!(active_runs(Vec::new()), Vec::<usize>::new());
        assert_eq!(active_runs([true; 3]), vec![3]);
    }
}
