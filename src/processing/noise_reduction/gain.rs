// src/processing/noise_reduction/gain.rs
//! Phase-preserving magnitude gains
//!
//! Both gains are real and non-negative, so applying them as `h * Y` scales the
//! magnitude and leaves the phase of every bin untouched.

use crate::utils::math::{div0, mean};
use rustfft::num_complex::Complex64;

/// Scalar power-spectral-subtraction gain `sqrt(max(1 - mean(Pnn)/mean(Pyy), floor))`
pub fn power_spectral_subtraction_gain(pyy_mean: f64, pnn_mean: f64, floor: f64) -> f64 {
    (1.0 - div0(pnn_mean, pyy_mean)).max(floor).sqrt()
}

/// Power spectral subtraction with a single gain for the whole spectrum
pub fn power_spectral_subtraction(
    spectrum: &[Complex64],
    pyy: &[f64],
    pnn: &[f64],
    floor: f64,
) -> Vec<Complex64> {
    let gain = power_spectral_subtraction_gain(mean(pyy), mean(pnn), floor);
    spectrum.iter().map(|&y| y * gain).collect()
}

/// Per-bin Wiener gain `max(1 - Pnn/Pyy, floor)`
pub fn wiener_gain(pyy: &[f64], pnn: &[f64], floor: f64) -> Vec<f64> {
    pyy.iter()
        .zip(pnn)
        .map(|(&signal, &noise)| (1.0 - div0(noise, signal)).max(floor))
        .collect()
}

/// Wiener smoothing with a per-bin gain
pub fn wiener_smoother(
    spectrum: &[Complex64],
    pyy: &[f64],
    pnn: &[f64],
    floor: f64,
) -> Vec<Complex64> {
    spectrum
        .iter()
        .zip(wiener_gain(pyy, pnn, floor))
        .map(|(&y, gain)| y * gain)
        .collect()
}
