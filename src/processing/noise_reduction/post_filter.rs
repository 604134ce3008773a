// src/processing/noise_reduction/post_filter.rs
//! Single-channel post-filter for the combined output
//!
//! Segments the beamformer output, then walks the segments strictly left to right:
//! each segment's noise estimate seeds the next. Bins outside the speech band are
//! zeroed before the inverse transform and overlap-add.

use super::gain::wiener_smoother;
use super::noise_tracker::{NoiseTracker, NoiseTrackerParams, NoiseTrackerState};
use crate::config::{constants::signal, ConfigError, SessionConfig};
use crate::processing::segmentation::{framing, overlap_add};
use crate::processing::spectrum::{estimate_psd, MatrixCache, SpectralAnalyzer};
use rustfft::num_complex::Complex64;
use std::sync::Arc;
use tracing::trace;

/// Noise tracking, Wiener gain and bandpass on a single channel
#[derive(Debug)]
pub struct SingleChannelPostFilter {
    analyzer: SpectralAnalyzer,
    tracker: NoiseTracker,
    cache: Arc<MatrixCache>,
    sample_rate_hz: f64,
    psd_window_factor: f64,
    wiener_floor: f64,
    low_hz: f64,
    high_hz: f64,
    carry_state: bool,
    state: NoiseTrackerState,
}

impl SingleChannelPostFilter {
    pub fn from_config(config: &SessionConfig, cache: Arc<MatrixCache>) -> Result<Self, ConfigError> {
        let post = &config.post_filter;
        let params = NoiseTrackerParams {
            q_window: post.variance_window_factor,
            ..NoiseTrackerParams::default()
        };

        Ok(Self {
            analyzer: SpectralAnalyzer::new(config.post_frame_size()?),
            tracker: NoiseTracker::new(params, cache.clone()),
            cache,
            sample_rate_hz: config.sample_rate_hz as f64,
            psd_window_factor: post.psd_window_factor,
            wiener_floor: post.wiener_floor,
            low_hz: post.low_hz,
            high_hz: post.high_hz,
            carry_state: post.carry_state,
            state: NoiseTrackerState::default(),
        })
    }

    /// Enhance one window of combined output.
    ///
    /// Tracker state starts cold for every window unless `carry_state` is set.
    pub fn process(&mut self, signal: &[i16]) -> Vec<i16> {
        let state = if self.carry_state {
            std::mem::take(&mut self.state)
        } else {
            NoiseTrackerState::default()
        };

        let (output, state) = self.enhance(signal, state);
        if self.carry_state {
            self.state = state;
        }
        output
    }

    /// Enhance `signal` starting from an explicit tracker state
    pub fn enhance(&self, signal: &[i16], mut state: NoiseTrackerState) -> (Vec<i16>, NoiseTrackerState) {
        let samples: Vec<f64> = signal.iter().map(|&x| x as f64).collect();
        let segments = framing(&samples, self.analyzer.frame_size(), signal::DEFAULT_FRAME_OVERLAP);

        let mut enhanced = Vec::with_capacity(segments.len());
        for segment in &segments {
            let spectrum = self.analyzer.fft(segment);
            let pyy = estimate_psd(&spectrum, self.psd_window_factor, &self.cache);

            let (estimate, next) = self.tracker.track(&pyy, state);
            let speech = wiener_smoother(&spectrum, &pyy, &estimate.noise_psd, self.wiener_floor);
            state = next.with_speech_psd(estimate_psd(&speech, 0.0, &self.cache));

            enhanced.push(speech);
        }

        for spectrum in enhanced.iter_mut() {
            self.bandpass(spectrum);
        }
        trace!(segments = enhanced.len(), "post-filter pass complete");

        let frames: Vec<Vec<f64>> = enhanced
            .iter()
            .map(|spectrum| self.analyzer.ifft(spectrum).into_iter().map(|x| x.re).collect())
            .collect();
        (overlap_add(&frames, signal::DEFAULT_FRAME_OVERLAP), state)
    }

    /// Zero every bin whose frequency magnitude is not strictly inside the band
    pub fn bandpass(&self, spectrum: &mut [Complex64]) {
        let n = spectrum.len();
        for (k, bin) in spectrum.iter_mut().enumerate() {
            let freq = fft_frequency(k, n, self.sample_rate_hz).abs();
            if !(self.low_hz < freq && freq < self.high_hz) {
                *bin = Complex64::default();
            }
        }
    }

    pub fn frame_size(&self) -> usize {
        self.analyzer.frame_size()
    }

    pub fn reset(&mut self) {
        self.state = NoiseTrackerState::default();
    }
}

/// Centre frequency of bin `k` in an `n`-point full FFT, negative above Nyquist
pub fn fft_frequency(k: usize, n: usize, sample_rate_hz: f64) -> f64 {
    let signed = if k < (n + 1) / 2 { k as f64 } else { k as f64 - n as f64 };
    signed * sample_rate_hz / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.sample_rate_hz = 16_000;
        config.post_filter.enabled = true;
        config
    }

    fn filter(config: &SessionConfig) -> SingleChannelPostFilter {
        SingleChannelPostFilter::from_config(config, Arc::new(MatrixCache::new())).unwrap()
    }

    #[test]
    fn test_fft_frequency_layout() {
        assert_eq!(fft_frequency(0, 8, 8.0), 0.0);
        assert_eq!(fft_frequency(3, 8, 8.0), 3.0);
        assert_eq!(fft_frequency(4, 8, 8.0), -4.0);
        assert_eq!(fft_frequency(7, 8, 8.0), -1.0);
    }

    #[test]
    fn test_bandpass_zeroes_outside_band() {
        let filter = filter(&config());
        let n = filter.frame_size();
        let mut spectrum = vec![Complex64::new(1.0, 1.0); n];
        filter.bandpass(&mut spectrum);

        for (k, bin) in spectrum.iter().enumerate() {
            let freq = fft_frequency(k, n, 16_000.0).abs();
            if freq > 300.0 && freq < 3400.0 {
                assert_eq!(*bin, Complex64::new(1.0, 1.0));
            } else {
                assert_eq!(*bin, Complex64::default());
            }
        }
    }

    #[test]
    fn test_output_length_matches_window() {
        let mut filter = filter(&config());
        let signal = vec![100i16; 4096];
        assert_eq!(filter.process(&signal).len(), 4096);
    }

    #[test]
    fn test_out_of_band_tone_is_removed() {
        let mut filter = filter(&config());
        let signal: Vec<i16> = (0..4096)
            .map(|n| (8000.0 * (2.0 * PI * 6000.0 * n as f64 / 16_000.0).sin()) as i16)
            .collect();
        let output = filter.process(&signal);
        let peak = output.iter().map(|x| x.unsigned_abs()).max().unwrap_or(0);
        assert!(peak < 400, "out-of-band tone leaked with peak {}", peak);
    }

    #[test]
    fn test_state_starts_cold_unless_carried() {
        let signal = vec![50i16; 4096];

        let mut cold = filter(&config());
        let first = cold.process(&signal);
        assert_eq!(cold.process(&signal), first);

        let mut carried_config = config();
        carried_config.post_filter.carry_state = true;
        let mut carried = filter(&carried_config);
        carried.process(&signal);
        assert!(!carried.state.is_cold());
        carried.reset();
        assert!(carried.state.is_cold());
    }
}
