// src/steering/traits.rs
//! Steering estimator abstraction

use super::types::{ArrayGeometry, SteeringError, SteeringEstimate};
use crate::acquisition::Window;

/// Direction-of-arrival and steering-vector estimation.
///
/// Implementations may be expensive; callers cache the result and only ask again
/// on the refresh cadence. The returned matrix must be `frame_size / 2 + 1` bins
/// by the window's channel count.
pub trait SteeringEstimator: Send + Sync {
    fn estimate(
        &self,
        window: &Window,
        geometry: &ArrayGeometry,
        sample_rate_hz: u32,
        frame_size: usize,
    ) -> Result<SteeringEstimate, SteeringError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "steering-estimator"
    }
}
