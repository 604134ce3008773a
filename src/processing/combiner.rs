// src/processing/combiner.rs
//! Frequency-domain delay-and-sum combination
//!
//! Every channel's bin is scaled by `1 / channels` and the weighted sum uses the
//! steering weights as given, without conjugation. Weights that undo a plane
//! wave's inter-channel phase therefore return that wave at unity gain.

use super::noise_reduction::gain::power_spectral_subtraction_gain;
use super::spectrum::{estimate_segment_psd, MatrixCache};
use crate::config::PreProcessingConfig;
use crate::error::{EnhanceError, EnhanceResult};
use crate::steering::SteeringVectorSet;
use crate::utils::math::mean;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Spectrogram of one channel, `[segment][bin]`
pub type ChannelSpectra = Vec<Vec<Complex64>>;

/// Stationary noise PSD per channel, measured once offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceNoiseProfile {
    pub channels: Vec<Vec<f64>>,
}

impl ReferenceNoiseProfile {
    pub fn new(channels: Vec<Vec<f64>>) -> Self {
        Self { channels }
    }

    /// Load a profile from a JSON file of the form `{"channels": [[...], ...]}`
    pub fn load<P: AsRef<Path>>(path: P) -> EnhanceResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| EnhanceError::Io {
            operation: format!("read reference profile {}", path.display()),
            source,
        })?;
        let profile = Self::from_json(&content)?;
        info!(path = %path.display(), channels = profile.channel_count(), "reference noise profile loaded");
        Ok(profile)
    }

    pub fn from_json(content: &str) -> EnhanceResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| EnhanceError::configuration("reference_profile", format!("invalid JSON: {}", e)))
    }

    pub fn to_json(&self) -> EnhanceResult<String> {
        serde_json::to_string(self)
            .map_err(|e| EnhanceError::configuration("reference_profile", e.to_string()))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Mean reference PSD of `channel`
    pub fn mean_power(&self, channel: usize) -> f64 {
        self.channels.get(channel).map(|psd| mean(psd)).unwrap_or(0.0)
    }
}

/// Power spectral subtraction of a fixed reference before combination
#[derive(Debug, Clone)]
pub struct PreSubtraction {
    profile: ReferenceNoiseProfile,
    floor: f64,
    psd_window_factor: f64,
    warmup_chunks: usize,
}

impl PreSubtraction {
    pub fn new(profile: ReferenceNoiseProfile, config: &PreProcessingConfig) -> Self {
        Self {
            profile,
            floor: config.floor,
            psd_window_factor: config.psd_window_factor,
            warmup_chunks: config.warmup_chunks,
        }
    }

    /// True once `chunk_index` windows have already been processed past warm-up
    pub fn is_active(&self, chunk_index: usize) -> bool {
        chunk_index >= self.warmup_chunks
    }

    pub fn profile(&self) -> &ReferenceNoiseProfile {
        &self.profile
    }

    /// Scale each channel by its subtraction gain, phase untouched
    pub fn apply(&self, spectra: &mut [ChannelSpectra], cache: &MatrixCache) {
        for (channel, segments) in spectra.iter_mut().enumerate() {
            let pyy = estimate_segment_psd(segments, self.psd_window_factor, cache);
            let pyy_mean = pyy.mean().unwrap_or(0.0);
            let gain = power_spectral_subtraction_gain(pyy_mean, self.profile.mean_power(channel), self.floor);

            for bin in segments.iter_mut().flatten() {
                *bin *= gain;
            }
        }
    }
}

/// Per-bin multi-channel combiner
#[derive(Debug, Clone)]
pub struct SpectralCombiner {
    channel_count: usize,
    channel_weight: f64,
}

impl SpectralCombiner {
    pub fn new(channel_count: usize) -> Self {
        Self {
            channel_count,
            channel_weight: 1.0 / channel_count.max(1) as f64,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Combine all channels into a single `[segment][bin]` spectrogram
    pub fn combine(
        &self,
        spectra: &[ChannelSpectra],
        steering: &SteeringVectorSet,
    ) -> EnhanceResult<Vec<Vec<Complex64>>> {
        if spectra.len() != self.channel_count {
            return Err(EnhanceError::InvalidData {
                data_type: "channel spectra".to_string(),
                reason: format!("expected {} channels, got {}", self.channel_count, spectra.len()),
                context: crate::error_context!("combiner", "combine"),
            });
        }

        let segments = spectra.first().map(Vec::len).unwrap_or(0);
        let bins = spectra
            .first()
            .and_then(|channel| channel.first())
            .map(Vec::len)
            .unwrap_or(0);
        steering.validate(bins, self.channel_count).map_err(EnhanceError::from)?;

        debug!(segments, bins, channels = self.channel_count, "combining channels");
        Ok((0..segments)
            .map(|s| self.combine_segment(spectra, s, steering))
            .collect())
    }

    /// `combined[i] = sum_c w[i][c] * Y[c][s][i] / channels`
    pub fn combine_segment(
        &self,
        spectra: &[ChannelSpectra],
        segment: usize,
        steering: &SteeringVectorSet,
    ) -> Vec<Complex64> {
        let bins = steering.bin_count();
        (0..bins)
            .map(|i| {
                steering
                    .bin(i)
                    .iter()
                    .zip(spectra)
                    .map(|(&w, channel)| w * channel[segment][i] * self.channel_weight)
                    .sum()
            })
            .collect()
    }
}
