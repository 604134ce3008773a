// src/steering/fixed_direction.rs
//! Far-field steering toward a fixed look direction

use super::traits::SteeringEstimator;
use super::types::{ArrayGeometry, SteeringError, SteeringEstimate, SteeringVectorSet};
use crate::acquisition::Window;
use crate::config::constants::steering::SPEED_OF_SOUND_M_S;
use ndarray::Array2;
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Steering estimator that always points at one azimuth/elevation.
///
/// A plane wave from direction `u` reaches microphone `m` at `r_m` earlier by
/// `tau_m = r_m . u / c`. The weight `exp(-j 2 pi f tau_m)` removes that lead,
/// so averaging the weighted channels returns the wave at unity gain.
#[derive(Debug, Clone)]
pub struct FixedDirectionEstimator {
    azimuth_deg: f64,
    elevation_deg: f64,
    speed_of_sound: f64,
}

impl Default for FixedDirectionEstimator {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl FixedDirectionEstimator {
    pub fn new(azimuth_deg: f64, elevation_deg: f64) -> Self {
        Self {
            azimuth_deg,
            elevation_deg,
            speed_of_sound: SPEED_OF_SOUND_M_S,
        }
    }

    pub fn with_speed_of_sound(mut self, speed_m_s: f64) -> Self {
        self.speed_of_sound = speed_m_s;
        self
    }

    /// Unit vector pointing toward the source
    pub fn direction(&self) -> [f64; 3] {
        let azimuth = self.azimuth_deg.to_radians();
        let elevation = self.elevation_deg.to_radians();
        [
            elevation.cos() * azimuth.cos(),
            elevation.cos() * azimuth.sin(),
            elevation.sin(),
        ]
    }

    /// Arrival lead of each microphone relative to the array origin, seconds
    pub fn delays(&self, geometry: &ArrayGeometry) -> Vec<f64> {
        let u = self.direction();
        geometry
            .positions()
            .iter()
            .map(|r| (r[0] * u[0] + r[1] * u[1] + r[2] * u[2]) / self.speed_of_sound)
            .collect()
    }

    /// Weights for every real-FFT bin of a `frame_size` frame
    pub fn steering_vectors(
        &self,
        geometry: &ArrayGeometry,
        sample_rate_hz: u32,
        frame_size: usize,
    ) -> SteeringVectorSet {
        let delays = self.delays(geometry);
        let bins = frame_size / 2 + 1;
        let weights = Array2::from_shape_fn((bins, delays.len()), |(k, m)| {
            let freq = k as f64 * sample_rate_hz as f64 / frame_size as f64;
            Complex64::from_polar(1.0, -2.0 * PI * freq * delays[m])
        });
        SteeringVectorSet::new(weights)
    }
}

impl SteeringEstimator for FixedDirectionEstimator {
    fn estimate(
        &self,
        window: &Window,
        geometry: &ArrayGeometry,
        sample_rate_hz: u32,
        frame_size: usize,
    ) -> Result<SteeringEstimate, SteeringError> {
        if geometry.channel_count() != window.channel_count() {
            return Err(SteeringError::GeometryMismatch {
                positions: geometry.channel_count(),
                channels: window.channel_count(),
            });
        }

        Ok(SteeringEstimate {
            azimuth_deg: self.azimuth_deg,
            elevation_deg: self.elevation_deg,
            vectors: self.steering_vectors(geometry, sample_rate_hz, frame_size),
        })
    }

    fn name(&self) -> &str {
        "fixed-direction"
    }
}
