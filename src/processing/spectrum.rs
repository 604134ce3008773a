// src/processing/spectrum.rs
//! FFT transforms and power spectral density estimation
//!
//! Real transforms are built on the complex planner output: `rfft` keeps the
//! `N/2 + 1` non-negative bins and `irfft` rebuilds the Hermitian spectrum
//! before inverting, discarding the imaginary parts of the DC and Nyquist bins.
//!
//! PSD smoothing uses a banded Bartlett averaging matrix. Matrices depend only on
//! their dimensions, so they are memoised in a [`MatrixCache`] owned by whoever
//! runs the estimates.

use ndarray::{Array1, Array2, Axis};
use parking_lot::Mutex;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::collections::HashMap;
use std::sync::Arc;

/// Forward and inverse transforms for one frame length
#[derive(Clone)]
pub struct SpectralAnalyzer {
    frame_size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("frame_size", &self.frame_size)
            .finish()
    }
}

impl SpectralAnalyzer {
    pub fn new(frame_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            frame_size,
            forward: planner.plan_fft_forward(frame_size),
            inverse: planner.plan_fft_inverse(frame_size),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of bins produced by [`rfft`](Self::rfft)
    pub fn bin_count(&self) -> usize {
        self.frame_size / 2 + 1
    }

    /// Full complex spectrum of a real frame
    pub fn fft(&self, frame: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = (0..self.frame_size)
            .map(|i| Complex64::new(frame.get(i).copied().unwrap_or(0.0), 0.0))
            .collect();
        self.forward.process(&mut buffer);
        buffer
    }

    /// Non-negative frequency bins of a real frame
    pub fn rfft(&self, frame: &[f64]) -> Vec<Complex64> {
        let mut spectrum = self.fft(frame);
        spectrum.truncate(self.bin_count());
        spectrum
    }

    /// Normalised inverse of a full complex spectrum
    pub fn ifft(&self, spectrum: &[Complex64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = (0..self.frame_size)
            .map(|i| spectrum.get(i).copied().unwrap_or_default())
            .collect();
        self.inverse.process(&mut buffer);

        let scale = 1.0 / self.frame_size as f64;
        buffer.iter_mut().for_each(|x| *x *= scale);
        buffer
    }

    /// Real frame from its non-negative frequency bins
    pub fn irfft(&self, bins: &[Complex64]) -> Vec<f64> {
        let n = self.frame_size;
        if n == 0 {
            return Vec::new();
        }

        let half = n / 2;
        let mut full = vec![Complex64::default(); n];
        for (slot, &bin) in full.iter_mut().zip(bins.iter().take(half + 1)) {
            *slot = bin;
        }
        full[0].im = 0.0;
        if n % 2 == 0 {
            full[half].im = 0.0;
        }
        for k in 1..n - half {
            full[n - k] = full[k].conj();
        }

        self.ifft(&full).into_iter().map(|x| x.re).collect()
    }
}

/// Memoised Bartlett matrices and smoothing bias vectors
#[derive(Debug, Default)]
pub struct MatrixCache {
    bartlett: Mutex<HashMap<(usize, usize), Arc<Array2<f64>>>>,
    smoothing_bias: Mutex<HashMap<(usize, u64), Arc<Vec<f64>>>>,
}

impl MatrixCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bartlett averaging matrix of size `len` and bandwidth `width`
    pub fn bartlett(&self, len: usize, width: usize) -> Arc<Array2<f64>> {
        self.bartlett
            .lock()
            .entry((len, width))
            .or_insert_with(|| Arc::new(bartlett_matrix(len, width)))
            .clone()
    }

    /// Bias correction `1 / (1 - alpha^t)` for `t = 1..=len`
    pub fn smoothing_bias(&self, len: usize, alpha: f64) -> Arc<Vec<f64>> {
        self.smoothing_bias
            .lock()
            .entry((len, alpha.to_bits()))
            .or_insert_with(|| {
                Arc::new(
                    (1..=len)
                        .map(|t| 1.0 / (1.0 - alpha.powi(t as i32)))
                        .collect(),
                )
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.bartlett.lock().len() + self.smoothing_bias.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Row-normalised banded matrix averaging each element with up to `width - 1`
/// preceding ones: `T[i][j] = 1` when `0 <= i - j < width`.
pub fn bartlett_matrix(len: usize, width: usize) -> Array2<f64> {
    let width = width.max(1);
    let mut matrix = Array2::<f64>::zeros((len, len));
    for (i, mut row) in matrix.axis_iter_mut(Axis(0)).enumerate() {
        let start = (i + 1).saturating_sub(width);
        let count = (i + 1 - start) as f64;
        for j in start..=i {
            row[j] = 1.0 / count;
        }
    }
    matrix
}

/// Averaging width for a sequence of `len` elements: `round(len * factor)`, at least one
pub fn bartlett_width(len: usize, factor: f64) -> usize {
    ((len as f64 * factor).round_ties_even() as usize).max(1)
}

/// Bartlett-smoothed estimate of a sequence
pub fn bartlett_estimate(values: &[f64], factor: f64, cache: &MatrixCache) -> Vec<f64> {
    let len = values.len();
    if len == 0 {
        return Vec::new();
    }
    let matrix = cache.bartlett(len, bartlett_width(len, factor));
    matrix.dot(&Array1::from(values.to_vec())).to_vec()
}

/// Power spectral density of a spectrum.
///
/// `window_factor == 0` gives the raw periodogram `|Y|^2`; otherwise the
/// periodogram is Bartlett-smoothed across bins.
pub fn estimate_psd(spectrum: &[Complex64], window_factor: f64, cache: &MatrixCache) -> Vec<f64> {
    let periodogram: Vec<f64> = spectrum.iter().map(|y| y.norm_sqr()).collect();
    if window_factor == 0.0 {
        periodogram
    } else {
        bartlett_estimate(&periodogram, window_factor, cache)
    }
}

/// PSD of a segments-by-bins spectrogram, averaged along the segment axis
pub fn estimate_segment_psd(
    segments: &[Vec<Complex64>],
    window_factor: f64,
    cache: &MatrixCache,
) -> Array2<f64> {
    let rows = segments.len();
    let cols = segments.first().map(Vec::len).unwrap_or(0);
    let periodogram = Array2::from_shape_fn((rows, cols), |(s, k)| {
        segments[s].get(k).map(|y| y.norm_sqr()).unwrap_or(0.0)
    });

    if window_factor == 0.0 || rows == 0 {
        return periodogram;
    }
    let matrix = cache.bartlett(rows, bartlett_width(rows, window_factor));
    matrix.dot(&periodogram)
}

/// Bias-corrected exponential smoothing.
///
/// `s[t] = alpha * s[t-1] + (1 - alpha) * x[t]`, each term divided by
/// `1 - alpha^(t+1)` to undo the pull toward the zero initial state.
pub fn exponential_smoothing(values: &[f64], alpha: f64, cache: &MatrixCache) -> Vec<f64> {
    let bias = cache.smoothing_bias(values.len(), alpha);
    let mut state = 0.0;
    values
        .iter()
        .zip(bias.iter())
        .map(|(&x, &correction)| {
            state = alpha * state + (1.0 - alpha) * x;
            state * correction
        })
        .collect()
}
