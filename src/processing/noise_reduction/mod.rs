// src/processing/noise_reduction/mod.rs
//! Noise reduction stages
//!
//! - Phase-preserving spectral subtraction and Wiener gains
//! - Adaptive noise PSD tracking with speech presence probability
//! - Single-channel post-filter combining both with a speech bandpass

pub mod gain;
pub mod noise_tracker;
pub mod post_filter;

pub use gain::{power_spectral_subtraction, power_spectral_subtraction_gain, wiener_gain, wiener_smoother};
pub use noise_tracker::{
    NoiseEstimate, NoiseTracker, NoiseTrackerParams, NoiseTrackerState, SpeechPresenceState,
};
pub use post_filter::SingleChannelPostFilter;
