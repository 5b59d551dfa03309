//! Small-signal numerics for trajectory analysis.
//!
//! Histories are capped at a few hundred samples, so the transforms here are
//! direct O(n²) sums rather than fast transforms.

use std::f64::consts::TAU;

use crate::numbers::usize_to_f64;

/// Standardize to zero mean and unit population variance; `epsilon` guards
/// constant series.
#[must_use]
pub fn zscore(values: &[f64], epsilon: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = usize_to_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt() + epsilon;
    values.iter().map(|v| (v - mean) / std).collect()
}

/// Magnitude of every bin of the discrete Fourier transform.
#[must_use]
pub fn dft_magnitudes(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let len = usize_to_f64(n);
    // k·t is reduced modulo n, so n twiddles cover every bin exactly.
    let twiddles: Vec<(f64, f64)> = (0..n)
        .map(|j| (TAU * usize_to_f64(j) / len).sin_cos())
        .collect();
    (0..n)
        .map(|k| {
            let (re, im) = values.iter().enumerate().fold((0.0, 0.0), |(re, im), (t, v)| {
                let (sin, cos) = twiddles[(k * t) % n];
                (v.mul_add(cos, re), v.mul_add(-sin, im))
            });
            re.hypot(im)
        })
        .collect()
}

/// Full autocorrelation: `2n - 1` lags from `-(n - 1)` to `n - 1`, zero lag in
/// the middle.
#[must_use]
pub fn autocorrelation_full(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    (0..2 * n - 1)
        .map(|index| {
            let lag = index.abs_diff(n - 1);
            values[..n - lag]
                .iter()
                .zip(&values[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}
