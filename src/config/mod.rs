// src/config/mod.rs
//! Session configuration and layered loading

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Frame size given as both or neither of samples and milliseconds
    #[error("Specify frame size in samples XOR milliseconds, not {0}")]
    FrameSize(&'static str),

    #[error("Configuration validation errors: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Configuration load error: {0}")]
    Load(String),

    #[error("Configuration export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for ConfigError {
    fn from(err: ::config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// Analysis frame length, given either in samples or in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FrameSize {
    #[serde(default)]
    pub samples: Option<usize>,
    #[serde(default)]
    pub ms: Option<f64>,
}

impl FrameSize {
    pub fn samples(samples: usize) -> Self {
        Self { samples: Some(samples), ms: None }
    }

    pub fn millis(ms: f64) -> Self {
        Self { samples: None, ms: Some(ms) }
    }

    /// Resolve to a sample count at `sample_rate_hz`
    pub fn resolve(&self, sample_rate_hz: u32) -> Result<usize, ConfigError> {
        match (self.samples, self.ms) {
            (Some(samples), None) => Ok(samples),
            (None, Some(ms)) => Ok((sample_rate_hz as f64 * (ms / 1000.0)) as usize),
            (Some(_), Some(_)) => Err(ConfigError::FrameSize("both")),
            (None, None) => Err(ConfigError::FrameSize("neither")),
        }
    }
}

/// Complete per-session configuration, fixed at construction
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "defaults::sample_rate_hz")]
    pub sample_rate_hz: u32,

    #[serde(default = "defaults::channel_count")]
    pub channel_count: usize,

    /// Samples per channel in each overlapping window (hop is half of this)
    #[serde(default = "defaults::window_size")]
    pub window_size: usize,

    /// STFT frame used to segment each window
    #[serde(default = "defaults::frame")]
    pub frame: FrameSize,

    /// Steering vectors are re-estimated every this many windows
    #[serde(default = "defaults::steering_refresh_interval")]
    pub steering_refresh_interval: usize,

    #[serde(default = "defaults::min_rows_per_block")]
    pub min_rows_per_block: usize,

    #[serde(default)]
    pub pre_processing: PreProcessingConfig,

    #[serde(default)]
    pub post_filter: PostFilterConfig,
}

/// Fixed-reference power spectral subtraction before combination
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreProcessingConfig {
    #[serde(default = "defaults::pre_enabled")]
    pub enabled: bool,

    /// Windows processed before subtraction switches on
    #[serde(default = "defaults::warmup_chunks")]
    pub warmup_chunks: usize,

    #[serde(default = "defaults::pre_floor")]
    pub floor: f64,

    #[serde(default = "defaults::pre_psd_window_factor")]
    pub psd_window_factor: f64,

    /// JSON file holding one reference noise PSD per channel
    #[serde(default)]
    pub reference_profile_path: Option<PathBuf>,
}

/// Single-channel post-filter on the combined output
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostFilterConfig {
    #[serde(default = "defaults::post_enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::post_frame")]
    pub frame: FrameSize,

    #[serde(default = "defaults::post_psd_window_factor")]
    pub psd_window_factor: f64,

    #[serde(default = "defaults::post_variance_window_factor")]
    pub variance_window_factor: f64,

    #[serde(default = "defaults::wiener_floor")]
    pub wiener_floor: f64,

    #[serde(default = "defaults::low_hz")]
    pub low_hz: f64,

    #[serde(default = "defaults::high_hz")]
    pub high_hz: f64,

    /// Thread noise-tracker state across windows instead of starting cold
    #[serde(default)]
    pub carry_state: bool,
}

/// Default value providers using constants
mod defaults {
    use super::FrameSize;
    use crate::config::constants::*;

    pub fn sample_rate_hz() -> u32 { signal::DEFAULT_SAMPLE_RATE_HZ }
    pub fn channel_count() -> usize { signal::DEFAULT_CHANNEL_COUNT }
    pub fn window_size() -> usize { signal::DEFAULT_WINDOW_SIZE }
    pub fn frame() -> FrameSize { FrameSize::samples(signal::DEFAULT_FRAME_SIZE) }
    pub fn steering_refresh_interval() -> usize { steering::DEFAULT_REFRESH_INTERVAL }
    pub fn min_rows_per_block() -> usize { signal::MIN_ROWS_PER_BLOCK }

    pub fn pre_enabled() -> bool { pre_processing::DEFAULT_ENABLED }
    pub fn warmup_chunks() -> usize { pre_processing::DEFAULT_WARMUP_CHUNKS }
    pub fn pre_floor() -> f64 { pre_processing::DEFAULT_FLOOR }
    pub fn pre_psd_window_factor() -> f64 { pre_processing::DEFAULT_PSD_WINDOW_FACTOR }

    pub fn post_enabled() -> bool { post_filter::DEFAULT_ENABLED }
    pub fn post_frame() -> FrameSize { FrameSize::samples(post_filter::DEFAULT_FRAME_SIZE) }
    pub fn post_psd_window_factor() -> f64 { post_filter::DEFAULT_PSD_WINDOW_FACTOR }
    pub fn post_variance_window_factor() -> f64 { post_filter::DEFAULT_VARIANCE_WINDOW_FACTOR }
    pub fn wiener_floor() -> f64 { post_filter::DEFAULT_WIENER_FLOOR }
    pub fn low_hz() -> f64 { post_filter::DEFAULT_LOW_HZ }
    pub fn high_hz() -> f64 { post_filter::DEFAULT_HIGH_HZ }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::sample_rate_hz(),
            channel_count: defaults::channel_count(),
            window_size: defaults::window_size(),
            frame: defaults::frame(),
            steering_refresh_interval: defaults::steering_refresh_interval(),
            min_rows_per_block: defaults::min_rows_per_block(),
            pre_processing: PreProcessingConfig::default(),
            post_filter: PostFilterConfig::default(),
        }
    }
}

impl Default for PreProcessingConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::pre_enabled(),
            warmup_chunks: defaults::warmup_chunks(),
            floor: defaults::pre_floor(),
            psd_window_factor: defaults::pre_psd_window_factor(),
            reference_profile_path: None,
        }
    }
}

impl Default for PostFilterConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::post_enabled(),
            frame: defaults::post_frame(),
            psd_window_factor: defaults::post_psd_window_factor(),
            variance_window_factor: defaults::post_variance_window_factor(),
            wiener_floor: defaults::wiener_floor(),
            low_hz: defaults::low_hz(),
            high_hz: defaults::high_hz(),
            carry_state: false,
        }
    }
}

impl SessionConfig {
    /// Step between consecutive windows
    pub fn step_size(&self) -> usize {
        self.window_size / 2
    }

    /// STFT frame length in samples
    pub fn frame_size(&self) -> Result<usize, ConfigError> {
        self.frame.resolve(self.sample_rate_hz)
    }

    /// Post-filter frame length in samples
    pub fn post_frame_size(&self) -> Result<usize, ConfigError> {
        self.post_filter.frame.resolve(self.sample_rate_hz)
    }

    /// Number of real-FFT bins per frame
    pub fn bin_count(&self) -> Result<usize, ConfigError> {
        Ok(self.frame_size()? / 2 + 1)
    }

    /// Validate the configuration, collecting every problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.sample_rate_hz == 0 {
            errors.push("Sample rate must be positive".to_string());
        }
        if self.channel_count < signal::MIN_CHANNEL_COUNT || self.channel_count > signal::MAX_CHANNEL_COUNT {
            errors.push(format!(
                "Channel count {} outside {}..={}",
                self.channel_count, signal::MIN_CHANNEL_COUNT, signal::MAX_CHANNEL_COUNT
            ));
        }
        if self.window_size < 2 || self.window_size % 2 != 0 {
            errors.push(format!("Window size {} must be even and at least 2", self.window_size));
        }
        if self.steering_refresh_interval == 0 {
            errors.push("Steering refresh interval must be at least 1".to_string());
        }

        // A frame size XOR error aborts construction on its own
        let frame_size = self.frame_size()?;
        check_frame(&mut errors, "Frame", frame_size, self.window_size);

        let pre = &self.pre_processing;
        if !(0.0..=1.0).contains(&pre.floor) {
            errors.push(format!("Pre-processing floor {} must be within [0, 1]", pre.floor));
        }
        if !(pre.psd_window_factor > 0.0 && pre.psd_window_factor <= 1.0) {
            errors.push(format!(
                "Pre-processing PSD window factor {} must be within (0, 1]",
                pre.psd_window_factor
            ));
        }

        let post = &self.post_filter;
        if post.enabled {
            let post_frame = self.post_frame_size()?;
            check_frame(&mut errors, "Post-filter frame", post_frame, self.window_size);
        }
        if !(0.0..=1.0).contains(&post.psd_window_factor) {
            errors.push(format!(
                "Post-filter PSD window factor {} must be within [0, 1]",
                post.psd_window_factor
            ));
        }
        if !(post.variance_window_factor > 0.0 && post.variance_window_factor <= 1.0) {
            errors.push(format!(
                "Post-filter variance window factor {} must be within (0, 1]",
                post.variance_window_factor
            ));
        }
        if !(0.0..=1.0).contains(&post.wiener_floor) {
            errors.push(format!("Wiener floor {} must be within [0, 1]", post.wiener_floor));
        }
        if post.low_hz < 0.0 || post.low_hz >= post.high_hz {
            errors.push(format!(
                "Bandpass cutoffs must satisfy 0 <= low ({}) < high ({})",
                post.low_hz, post.high_hz
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

// Overlap-add of a window only reproduces the window length when the frame hop divides it.
fn check_frame(errors: &mut Vec<String>, label: &str, frame_size: usize, window_size: usize) {
    if frame_size < 2 || frame_size % 2 != 0 {
        errors.push(format!("{} size {} must be even and at least 2", label, frame_size));
        return;
    }
    if frame_size > window_size {
        errors.push(format!(
            "{} size {} exceeds window size {}",
            label, frame_size, window_size
        ));
    }
    if window_size % (frame_size / 2) != 0 {
        errors.push(format!(
            "Window size {} is not a multiple of the {} hop {}",
            window_size, label.to_lowercase(), frame_size / 2
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.step_size(), 2048);
        assert_eq!(config.bin_count().unwrap(), 129);
    }

    #[test]
    fn test_frame_size_xor() {
        assert_eq!(FrameSize::samples(256).resolve(16_000).unwrap(), 256);
        assert_eq!(FrameSize::millis(16.0).resolve(16_000).unwrap(), 256);

        let both = FrameSize { samples: Some(256), ms: Some(16.0) };
        assert!(matches!(both.resolve(16_000), Err(ConfigError::FrameSize("both"))));

        let neither = FrameSize::default();
        assert!(matches!(neither.resolve(16_000), Err(ConfigError::FrameSize("neither"))));
    }

    #[test]
    fn test_frame_size_error_is_fatal_in_validation() {
        let mut config = SessionConfig::default();
        config.frame = FrameSize { samples: Some(256), ms: Some(5.0) };
        assert!(matches!(config.validate(), Err(ConfigError::FrameSize(_))));
    }

    #[test]
    fn test_invalid_window_geometry() {
        let mut config = SessionConfig::default();
        config.window_size = 4000; // not a multiple of the 128 hop
        assert!(config.validate().is_err());

        config.window_size = 128; // shorter than the frame
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_post_filter_config() {
        let mut config = SessionConfig::default();
        config.post_filter.enabled = true;
        config.post_filter.low_hz = 4000.0;
        match config.validate() {
            Err(ConfigError::Invalid(errors)) => {
                assert!(errors.iter().any(|e| e.contains("Bandpass")));
            }
            other => panic!("Expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = SessionConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: SessionConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.window_size, deserialized.window_size);
        assert_eq!(config.frame, deserialized.frame);
        assert_eq!(config.post_filter.wiener_floor, deserialized.post_filter.wiener_floor);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SessionConfig = toml::from_str(
            r#"
            channel_count = 1
            sample_rate_hz = 16000

            [frame]
            ms = 16.0
            "#,
        )
        .unwrap();

        assert_eq!(config.channel_count, 1);
        assert_eq!(config.frame_size().unwrap(), 256);
        assert_eq!(config.window_size, signal::DEFAULT_WINDOW_SIZE);
        assert!(config.validate().is_ok());
    }
}
