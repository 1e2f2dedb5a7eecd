//! Welch averaged-periodogram power spectral density.
//!
//! Matches the conventional defaults: periodic Hann taper, 50 % overlap,
//! per-segment mean removal, one-sided density scaling (units²/Hz), and a
//! plain mean across segments.

use std::f64::consts::PI;

use ndarray::Array1;

use super::window::{hann, power_sum};

/// Default segment length, also the shortest slice that gets a full segment.
pub const DEFAULT_SEGMENT_LEN: usize = 256;

#[derive(Clone, Debug)]
pub struct Psd {
    pub freqs: Array1<f64>,
    pub power: Array1<f64>,
}

impl Psd {
    /// Sum of PSD bins with `lo <= f <= hi`.
    pub fn band_power(&self, lo: f64, hi: f64) -> f64 {
        self.freqs
            .iter()
            .zip(self.power.iter())
            .filter(|(f, _)| **f >= lo && **f <= hi)
            .map(|(_, p)| *p)
            .sum()
    }
}

pub struct WelchEstimator {
    sampling_rate: f64,
    segment_len: usize,
    taper: Vec<f64>,
}

impl WelchEstimator {
    pub fn new(sampling_rate: f64, segment_len: usize) -> Self {
        WelchEstimator {
            sampling_rate,
            segment_len,
            taper: hann(segment_len, true),
        }
    }

    /// Estimate the PSD of `signal`. Slices shorter than the configured
    /// segment length are analysed as a single shorter segment.
    pub fn estimate(&self, signal: &[f64]) -> Psd {
        let nperseg = self.segment_len.min(signal.len());
        if nperseg == 0 {
            return Psd {
                freqs: Array1::zeros(0),
                power: Array1::zeros(0),
            };
        }

        let short_taper;
        let taper: &[f64] = if nperseg == self.segment_len {
            &self.taper
        } else {
            short_taper = hann(nperseg, true);
            &short_taper
        };

        let noverlap = nperseg / 2;
        let step = nperseg - noverlap;
        let segments = (signal.len() - noverlap) / step;
        let scale = 1.0 / (self.sampling_rate * power_sum(taper));
        let bins = nperseg / 2 + 1;

        let mut power = Array1::<f64>::zeros(bins);
        for k in 0..segments {
            let chunk = &signal[k * step..k * step + nperseg];
            let mean = chunk.iter().sum::<f64>() / nperseg as f64;
            let tapered: Vec<f64> = chunk
                .iter()
                .zip(taper.iter())
                .map(|(x, w)| (x - mean) * w)
                .collect();

            let spectrum = power_spectrum(&tapered);
            for (slot, value) in power.iter_mut().zip(spectrum.iter()) {
                *slot += value * scale;
            }
        }
        power /= segments as f64;

        // One-sided: fold negative frequencies except DC and, for even
        // lengths, the Nyquist bin.
        let fold_end = if nperseg % 2 == 0 { bins - 1 } else { bins };
        for slot in power.iter_mut().take(fold_end).skip(1) {
            *slot *= 2.0;
        }

        let df = self.sampling_rate / nperseg as f64;
        let freqs = Array1::from_iter((0..bins).map(|i| i as f64 * df));
        Psd { freqs, power }
    }
}

/// `|X[k]|²` for `k` in `0..=n/2`.
fn power_spectrum(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let bins = n / 2 + 1;
    let (real, imag) = if n.is_power_of_two() {
        fft(signal)
    } else {
        dft(signal, bins)
    };
    (0..bins)
        .map(|k| real[k] * real[k] + imag[k] * imag[k])
        .collect()
}

/// Iterative radix-2 decimation-in-time FFT of a real signal.
fn fft(signal: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    let mut real = signal.to_vec();
    let mut imag = vec![0.0f64; n];
    if n <= 1 {
        return (real, imag);
    }

    // Bit-reversal permutation
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if j > i {
            real.swap(i, j);
        }
    }

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let angle_step = -2.0 * PI / size as f64;
        for start in (0..n).step_by(size) {
            for k in 0..half {
                let angle = angle_step * k as f64;
                let (wi, wr) = angle.sin_cos();
                let i = start + k;
                let j = i + half;

                let tr = wr * real[j] - wi * imag[j];
                let ti = wr * imag[j] + wi * real[j];
                real[j] = real[i] - tr;
                imag[j] = imag[i] - ti;
                real[i] += tr;
                imag[i] += ti;
            }
        }
        size *= 2;
    }
    (real, imag)
}

/// Direct DFT for lengths that are not a power of two.
fn dft(signal: &[f64], bins: usize) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len() as f64;
    let mut real = vec![0.0; bins];
    let mut imag = vec![0.0; bins];
    for k in 0..bins {
        for (t, x) in signal.iter().enumerate() {
            let angle = -2.0 * PI * (k * t) as f64 / n;
            real[k] += x * angle.cos();
            imag[k] += x * angle.sin();
        }
    }
    (real, imag)
}
