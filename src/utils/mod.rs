//! Common utility functions for the enhancement core
//!
//! - PCM byte/sample conversion with saturating float to int16 casts
//! - Zero-safe division, means and table interpolation for the spectral stages

pub mod conversion;
pub mod math;

pub use conversion::{bytes_to_samples, samples_to_bytes, to_i16_saturating};
pub use math::{div0, interp, mean};
