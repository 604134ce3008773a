// src/steering/types.rs
//! Steering data types

use crate::config::constants::steering;
use ndarray::{Array2, ArrayView1};
use rustfft::num_complex::Complex64;
use thiserror::Error;

/// Failures reported by a steering estimator
#[derive(Debug, Error)]
pub enum SteeringError {
    #[error("Steering estimation failed: {0}")]
    Estimation(String),

    #[error("Steering matrix shape {bins}x{channels}, expected {expected_bins}x{expected_channels}")]
    ShapeMismatch {
        expected_bins: usize,
        expected_channels: usize,
        bins: usize,
        channels: usize,
    },

    #[error("Steering matrix contains non-finite weights")]
    NonFinite,

    #[error("Array geometry has {positions} microphones but the window has {channels} channels")]
    GeometryMismatch { positions: usize, channels: usize },
}

/// Microphone positions in metres, one `[x, y, z]` per channel
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayGeometry {
    positions: Vec<[f64; 3]>,
}

impl Default for ArrayGeometry {
    fn default() -> Self {
        Self::new(steering::DEFAULT_MIC_POSITIONS.to_vec())
    }
}

impl ArrayGeometry {
    pub fn new(positions: Vec<[f64; 3]>) -> Self {
        Self { positions }
    }

    /// Evenly spaced microphones along the x axis, centred on the origin
    pub fn linear(count: usize, spacing_m: f64) -> Self {
        let centre = (count.saturating_sub(1)) as f64 / 2.0;
        Self::new(
            (0..count)
                .map(|m| [(m as f64 - centre) * spacing_m, 0.0, 0.0])
                .collect(),
        )
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    pub fn channel_count(&self) -> usize {
        self.positions.len()
    }
}

/// Per-bin complex channel weights, `bins x channels`
#[derive(Debug, Clone, PartialEq)]
pub struct SteeringVectorSet {
    weights: Array2<Complex64>,
}

impl SteeringVectorSet {
    pub fn new(weights: Array2<Complex64>) -> Self {
        Self { weights }
    }

    /// All-ones weights: plain channel averaging
    pub fn unity(bins: usize, channels: usize) -> Self {
        Self::new(Array2::from_elem((bins, channels), Complex64::new(1.0, 0.0)))
    }

    pub fn bin_count(&self) -> usize {
        self.weights.nrows()
    }

    pub fn channel_count(&self) -> usize {
        self.weights.ncols()
    }

    /// Weights for frequency bin `bin`
    pub fn bin(&self, bin: usize) -> ArrayView1<'_, Complex64> {
        self.weights.row(bin)
    }

    pub fn weights(&self) -> &Array2<Complex64> {
        &self.weights
    }

    /// Check the matrix against the shape the combiner expects
    pub fn validate(&self, bins: usize, channels: usize) -> Result<(), SteeringError> {
        if self.bin_count() != bins || self.channel_count() != channels {
            return Err(SteeringError::ShapeMismatch {
                expected_bins: bins,
                expected_channels: channels,
                bins: self.bin_count(),
                channels: self.channel_count(),
            });
        }
        if self.weights.iter().any(|w| !w.re.is_finite() || !w.im.is_finite()) {
            return Err(SteeringError::NonFinite);
        }
        Ok(())
    }
}

/// Direction and weights for the dominant source in one window
#[derive(Debug, Clone, PartialEq)]
pub struct SteeringEstimate {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub vectors: SteeringVectorSet,
}
