// src/processing/mod.rs
//! Spectral processing for multi-channel speech enhancement

pub mod combiner;
pub mod noise_reduction;
pub mod pipeline;
pub mod segmentation;
pub mod spectrum;

pub use combiner::{ChannelSpectra, PreSubtraction, ReferenceNoiseProfile, SpectralCombiner};
pub use noise_reduction::{
    power_spectral_subtraction, wiener_smoother, NoiseTracker, NoiseTrackerState, SingleChannelPostFilter,
};
pub use pipeline::{EnhancementPipeline, PipelineMetrics};
pub use segmentation::{framing, hann_window, overlap_add, OverlapBuffer};
pub use spectrum::{estimate_psd, MatrixCache, SpectralAnalyzer};
