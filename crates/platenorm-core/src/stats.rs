//! Order statistics used by the robust normalizations.
//!
//! All functions expect finite inputs; callers validate before reaching here.

use crate::error::{NormError, NormResult};
use statrs::distribution::{ContinuousCDF, Normal};

/// Φ⁻¹(0.75), the divisor that turns a MAD into a consistent estimate of the
/// standard deviation under normality (≈ 0.6745).
pub fn mad_consistency_constant() -> NormResult<f64> {
    let gaussian = Normal::new(0.0, 1.0).map_err(|e| NormError::invalid_input(e.to_string()))?;
    Ok(gaussian.inverse_cdf(0.75))
}

fn sort_values(values: &mut [f64]) {
    values.sort_by(|a, b| a.total_cmp(b));
}

/// Median of an ascending slice. NaN when empty.
pub fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let mid = n / 2;
    if n % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median of arbitrary-order values.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sort_values(&mut sorted);
    median_sorted(&sorted)
}

/// Median absolute deviation from `center`, divided by `scale`.
pub fn scaled_mad(values: &[f64], center: f64, scale: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs() / scale).collect();
    median(&deviations)
}

/// Percentile `pct` (0..=100) of an ascending slice.
///
/// Interpolates linearly between the order statistics around rank
/// `pct / 100 * (n - 1)`. NaN when empty.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;
    if frac == 0.0 || lo + 1 >= n {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[lo + 1] - sorted[lo]) * frac
    }
}

/// Percentile of arbitrary-order values.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    let mut sorted = values.to_vec();
    sort_values(&mut sorted);
    percentile_sorted(&sorted, pct)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_constant_matches_normal_quartile() {
        let c = mad_consistency_constant().unwrap();
        assert!((c - 0.674_489_750_196_081_7).abs() < 1e-9);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn mad_ignores_outlier() {
        // deviations from 3: [2, 1, 0, 1, 97] -> median 1
        assert_eq!(scaled_mad(&[1.0, 2.0, 3.0, 4.0, 100.0], 3.0, 1.0), 1.0);
        assert_eq!(scaled_mad(&[5.0, 5.0, 5.0], 5.0, 0.6745), 0.0);
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        assert_eq!(percentile(&values, 1.0), 1.0);
        assert_eq!(percentile(&values, 99.0), 99.0);

        // rank = 0.01 * 3 = 0.03 -> 10 + 0.03 * 10
        let small = [40.0, 10.0, 30.0, 20.0];
        assert!((percentile(&small, 1.0) - 10.3).abs() < 1e-12);
        assert!((percentile(&small, 99.0) - 39.7).abs() < 1e-12);
    }

    #[test]
    fn percentile_single_value() {
        assert_eq!(percentile(&[7.0], 1.0), 7.0);
        assert_eq!(percentile(&[7.0], 99.0), 7.0);
    }
}
