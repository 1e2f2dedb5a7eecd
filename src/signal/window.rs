use std::f64::consts::PI;

/// Hann taper of `length` points.
///
/// `periodic` drops the closing zero of the symmetric form, which is what
/// spectral estimators want (the taper repeats every `length` samples).
/// Symmetric: `0.5 - 0.5 * cos(2*pi*i / (length-1))`.
pub fn hann(length: usize, periodic: bool) -> Vec<f64> {
    if length <= 1 {
        return vec![1.0; length];
    }
    let denom = (if periodic { length } else { length - 1 }) as f64;
    (0..length)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Sum of squared taper values, the power normalisation term of a PSD.
pub fn power_sum(window: &[f64]) -> f64 {
    window.iter().map(|w| w * w).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_point() {
        assert_eq!(hann(1, true), vec![1.0]);
        assert!(hann(0, true).is_empty());
    }

    #[test]
    fn test_periodic_shape() {
        let w = hann(4, true);
        assert_relative_eq!(w[0], 0.0);
        assert_relative_eq!(w[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(w[2], 1.0, epsilon = 1e-12);
        assert_relative_eq!(w[3], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_symmetric_endpoints() {
        let w = hann(5, false);
        assert_relative_eq!(w[0], 0.0);
        assert_relative_eq!(w[4], 0.0, epsilon = 1e-12);
        assert_relative_eq!(w[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_power_sum_of_periodic_hann() {
        // Periodic Hann of length N has sum(w^2) = 3N/8.
        let w = hann(256, true);
        assert_relative_eq!(power_sum(&w), 96.0, epsilon = 1e-9);
    }
}
