// src/processing/pipeline.rs
//! Per-window enhancement pipeline
//!
//! One pipeline belongs to one session and runs on that session's processing
//! thread. For every window it:
//!
//! 1. frames and transforms each channel (channels in parallel),
//! 2. fetches steering vectors from the cache, refreshing on cadence,
//! 3. optionally subtracts the reference noise once warm-up has passed,
//! 4. combines the channels bin by bin,
//! 5. inverts and overlap-adds the combined frames back to PCM,
//! 6. optionally runs the single-channel post-filter,
//!
//! and finally folds the processed window into the running reconstruction.

use super::combiner::{ChannelSpectra, PreSubtraction, ReferenceNoiseProfile, SpectralCombiner};
use super::noise_reduction::SingleChannelPostFilter;
use super::segmentation::{framing, overlap_add, OverlapBuffer};
use super::spectrum::{MatrixCache, SpectralAnalyzer};
use crate::acquisition::Window;
use crate::config::{constants::signal, SessionConfig};
use crate::error::{EnhanceError, EnhanceResult};
use crate::steering::{ArrayGeometry, SteeringCache, SteeringEstimator};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Timing and throughput of a pipeline
#[derive(Debug, Default, Clone)]
pub struct PipelineMetrics {
    pub windows_processed: u64,
    pub samples_emitted: u64,
    pub reconstruction_errors: u64,
    pub average_processing_time_us: f64,
    pub max_processing_time_us: f64,
}

/// Multi-channel to single-channel enhancement for one session
pub struct EnhancementPipeline {
    config: SessionConfig,
    analyzer: SpectralAnalyzer,
    combiner: SpectralCombiner,
    pre_subtraction: Option<PreSubtraction>,
    post_filter: Option<SingleChannelPostFilter>,
    steering: SteeringCache,
    estimator: Arc<dyn SteeringEstimator>,
    geometry: ArrayGeometry,
    overlap: OverlapBuffer,
    cache: Arc<MatrixCache>,
    metrics: PipelineMetrics,
    finished: bool,
}

impl std::fmt::Debug for EnhancementPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancementPipeline")
            .field("estimator", &self.estimator.name())
            .field("frame_size", &self.analyzer.frame_size())
            .field("window_size", &self.config.window_size)
            .field("pre_subtraction", &self.pre_subtraction.is_some())
            .field("post_filter", &self.post_filter.is_some())
            .finish()
    }
}

impl EnhancementPipeline {
    /// Build a pipeline; any configuration problem is fatal here.
    ///
    /// With pre-processing enabled the reference profile comes from `profile`,
    /// or else from the configured JSON path.
    pub fn new(
        config: &SessionConfig,
        estimator: Arc<dyn SteeringEstimator>,
        geometry: ArrayGeometry,
        profile: Option<ReferenceNoiseProfile>,
    ) -> EnhanceResult<Self> {
        config.validate()?;
        let frame_size = config.frame_size()?;

        if geometry.channel_count() != config.channel_count {
            return Err(EnhanceError::configuration(
                "pipeline",
                format!(
                    "array geometry has {} microphones, session has {} channels",
                    geometry.channel_count(),
                    config.channel_count
                ),
            ));
        }

        let cache = Arc::new(MatrixCache::new());
        let pre_subtraction = if config.pre_processing.enabled {
            let profile = match (profile, &config.pre_processing.reference_profile_path) {
                (Some(profile), _) => profile,
                (None, Some(path)) => ReferenceNoiseProfile::load(path)?,
                (None, None) => {
                    return Err(EnhanceError::configuration(
                        "pre_processing",
                        "enabled without a reference noise profile",
                    ))
                }
            };
            if profile.channel_count() != config.channel_count {
                return Err(EnhanceError::configuration(
                    "pre_processing",
                    format!(
                        "reference profile has {} channels, session has {}",
                        profile.channel_count(),
                        config.channel_count
                    ),
                ));
            }
            Some(PreSubtraction::new(profile, &config.pre_processing))
        } else {
            None
        };

        let post_filter = if config.post_filter.enabled {
            Some(SingleChannelPostFilter::from_config(config, cache.clone())?)
        } else {
            None
        };

        Ok(Self {
            config: config.clone(),
            analyzer: SpectralAnalyzer::new(frame_size),
            combiner: SpectralCombiner::new(config.channel_count),
            pre_subtraction,
            post_filter,
            steering: SteeringCache::new(config.steering_refresh_interval),
            estimator,
            geometry,
            overlap: OverlapBuffer::new(config.window_size, config.step_size()),
            cache,
            metrics: PipelineMetrics::default(),
            finished: false,
        })
    }

    /// Process one window and return the output samples it completes
    pub fn process_window(&mut self, window: &Window) -> EnhanceResult<Vec<i16>> {
        let start = Instant::now();
        let processed = self.enhance_window(window)?;

        let output = if window.is_final() {
            self.finished = true;
            self.overlap.finish(Some(&processed))
        } else {
            match self.overlap.append(&processed) {
                Ok(output) => output,
                Err(err) => {
                    warn!(window = window.index(), error = %err, "window could not be reconstructed");
                    self.metrics.reconstruction_errors += 1;
                    Vec::new()
                }
            }
        };

        self.update_metrics(start, output.len());
        Ok(output)
    }

    /// Release the reconstruction tail when the stream ended on a full window
    pub fn finish(&mut self) -> Vec<i16> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let output = self.overlap.finish(None);
        self.metrics.samples_emitted += output.len() as u64;
        output
    }

    /// Enhance one window to a single channel of the same length
    pub fn enhance_window(&mut self, window: &Window) -> EnhanceResult<Vec<i16>> {
        let chunk = window.index();
        let frame_size = self.analyzer.frame_size();
        let mut spectra = self.analyze(window);

        let steering = self.steering.vectors_for(
            chunk,
            window,
            self.estimator.as_ref(),
            &self.geometry,
            self.config.sample_rate_hz,
            frame_size,
        )?;

        if let Some(pre) = self.pre_subtraction.as_ref().filter(|pre| pre.is_active(chunk)) {
            pre.apply(&mut spectra, &self.cache);
        }

        let combined = self.combiner.combine(&spectra, steering)?;

        #[cfg(feature = "enhanced_validation")]
        validate_spectrum(&combined, chunk)?;

        let frames: Vec<Vec<f64>> = combined.iter().map(|bins| self.analyzer.irfft(bins)).collect();
        let mut output = overlap_add(&frames, signal::DEFAULT_FRAME_OVERLAP);

        if let Some(post) = self.post_filter.as_mut() {
            output = post.process(&output);
        }
        output.truncate(window.rows());

        debug!(chunk, rows = window.rows(), segments = combined.len(), "window enhanced");
        Ok(output)
    }

    fn analyze(&self, window: &Window) -> Vec<ChannelSpectra> {
        let analyzer = &self.analyzer;
        (0..window.channel_count())
            .into_par_iter()
            .map(|channel| {
                framing(&window.channel(channel), analyzer.frame_size(), signal::DEFAULT_FRAME_OVERLAP)
                    .iter()
                    .map(|frame| analyzer.rfft(frame))
                    .collect()
            })
            .collect()
    }

    fn update_metrics(&mut self, start: Instant, emitted: usize) {
        let elapsed_us = start.elapsed().as_secs_f64() * 1e6;
        let m = &mut self.metrics;
        m.windows_processed += 1;
        m.samples_emitted += emitted as u64;
        m.average_processing_time_us +=
            (elapsed_us - m.average_processing_time_us) / m.windows_processed as f64;
        m.max_processing_time_us = m.max_processing_time_us.max(elapsed_us);
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Number of times the steering estimator was consulted successfully
    pub fn steering_refreshes(&self) -> u64 {
        self.steering.refresh_count()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(feature = "enhanced_validation")]
fn validate_spectrum(spectrum: &[Vec<rustfft::num_complex::Complex64>], chunk: usize) -> EnhanceResult<()> {
    if spectrum.iter().flatten().any(|bin| !bin.re.is_finite() || !bin.im.is_finite()) {
        return Err(EnhanceError::InvalidData {
            data_type: "combined spectrum".to_string(),
            reason: "non-finite bin after combination".to_string(),
            context: crate::error_context!("pipeline", "enhance_window")
                .add_info("chunk", chunk.to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steering::{FixedDirectionEstimator, SteeringError, SteeringEstimate};

    fn config(channels: usize) -> SessionConfig {
        let mut config = SessionConfig::default();
        config.sample_rate_hz = 16_000;
        config.channel_count = channels;
        config.window_size = 1024;
        config
    }

    fn pipeline(config: &SessionConfig) -> EnhancementPipeline {
        EnhancementPipeline::new(
            config,
            Arc::new(FixedDirectionEstimator::new(90.0, 0.0)),
            ArrayGeometry::linear(config.channel_count, 0.05),
            None,
        )
        .unwrap()
    }

    fn tone_window(index: usize, rows: usize, channels: usize) -> Window {
        let samples: Vec<i16> = (0..rows * channels)
            .map(|i| {
                let n = (i / channels + index * rows / 2) as f64;
                (6000.0 * (2.0 * std::f64::consts::PI * 500.0 * n / 16_000.0).sin()) as i16
            })
            .collect();
        Window::from_interleaved(index, &samples, channels, false)
    }

    #[test]
    fn test_enhanced_window_keeps_length() {
        let config = config(2);
        let mut pipeline = pipeline(&config);
        let output = pipeline.enhance_window(&tone_window(0, 1024, 2)).unwrap();
        assert_eq!(output.len(), 1024);
    }

    #[test]
    fn test_first_window_emits_one_step() {
        let config = config(2);
        let mut pipeline = pipeline(&config);
        assert_eq!(pipeline.process_window(&tone_window(0, 1024, 2)).unwrap().len(), 512);
        assert_eq!(pipeline.process_window(&tone_window(1, 1024, 2)).unwrap().len(), 512);
        assert_eq!(pipeline.finish().len(), 512);
        assert!(pipeline.finish().is_empty());
        assert_eq!(pipeline.metrics().windows_processed, 2);
    }

    #[test]
    fn test_steering_refresh_cadence() {
        let config = config(2);
        let mut pipeline = pipeline(&config);
        for index in 0..5 {
            pipeline.process_window(&tone_window(index, 1024, 2)).unwrap();
        }
        assert_eq!(pipeline.steering_refreshes(), 3);
    }

    #[test]
    fn test_geometry_mismatch_is_fatal() {
        let result = EnhancementPipeline::new(
            &config(2),
            Arc::new(FixedDirectionEstimator::default()),
            ArrayGeometry::default(),
            None,
        );
        assert!(matches!(result, Err(EnhanceError::Configuration { .. })));
    }

    #[test]
    fn test_pre_processing_requires_profile() {
        let mut config = config(2);
        config.pre_processing.enabled = true;
        let result = EnhancementPipeline::new(
            &config,
            Arc::new(FixedDirectionEstimator::default()),
            ArrayGeometry::linear(2, 0.05),
            None,
        );
        assert!(matches!(result, Err(EnhanceError::Configuration { .. })));
    }

    struct FailingEstimator;

    impl SteeringEstimator for FailingEstimator {
        fn estimate(
            &self,
            _window: &Window,
            _geometry: &ArrayGeometry,
            _sample_rate_hz: u32,
            _frame_size: usize,
        ) -> Result<SteeringEstimate, SteeringError> {
            Err(SteeringError::Estimation("no dominant source".to_string()))
        }
    }

    #[test]
    fn test_estimator_failure_is_collaborator_error() {
        let config = config(2);
        let mut pipeline = EnhancementPipeline::new(
            &config,
            Arc::new(FailingEstimator),
            ArrayGeometry::linear(2, 0.05),
            None,
        )
        .unwrap();
        let result = pipeline.process_window(&tone_window(0, 1024, 2));
        assert!(matches!(result, Err(ref e) if e.is_session_fatal()));
    }

    #[test]
    fn test_short_final_window() {
        let config = config(2);
        let mut pipeline = pipeline(&config);
        pipeline.process_window(&tone_window(0, 1024, 2)).unwrap();

        let samples = vec![0i16; 300 * 2];
        let last = Window::from_interleaved(1, &samples, 2, true);
        let output = pipeline.process_window(&last).unwrap();
        assert_eq!(output.len(), 512);
        assert!(pipeline.is_finished());
    }
}
