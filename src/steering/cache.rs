// src/steering/cache.rs
//! Cached steering vectors with a fixed refresh cadence

use super::traits::SteeringEstimator;
use super::types::{ArrayGeometry, SteeringError, SteeringEstimate, SteeringVectorSet};
use crate::acquisition::Window;
use tracing::debug;

/// Holds the latest steering estimate for one session.
///
/// No combination may run before the first estimate exists, so an empty cache
/// always asks the estimator regardless of the cadence.
#[derive(Debug, Clone)]
pub struct SteeringCache {
    refresh_interval: usize,
    current: Option<SteeringEstimate>,
    refreshes: u64,
}

impl SteeringCache {
    pub fn new(refresh_interval: usize) -> Self {
        Self {
            refresh_interval: refresh_interval.max(1),
            current: None,
            refreshes: 0,
        }
    }

    /// True if window `chunk_index` must re-estimate
    pub fn needs_refresh(&self, chunk_index: usize) -> bool {
        self.current.is_none() || chunk_index % self.refresh_interval == 0
    }

    /// Steering vectors to use for window `chunk_index`, refreshing when due.
    ///
    /// The estimate must match `bins x channels`; anything else is rejected
    /// and the previous estimate is left in place.
    pub fn vectors_for(
        &mut self,
        chunk_index: usize,
        window: &Window,
        estimator: &dyn SteeringEstimator,
        geometry: &ArrayGeometry,
        sample_rate_hz: u32,
        frame_size: usize,
    ) -> Result<&SteeringVectorSet, SteeringError> {
        if self.needs_refresh(chunk_index) {
            let estimate = estimator.estimate(window, geometry, sample_rate_hz, frame_size)?;
            estimate
                .vectors
                .validate(frame_size / 2 + 1, window.channel_count())?;

            debug!(
                estimator = estimator.name(),
                chunk = chunk_index,
                azimuth_deg = estimate.azimuth_deg,
                elevation_deg = estimate.elevation_deg,
                "steering vectors refreshed"
            );
            self.refreshes += 1;
            self.current = Some(estimate);
        }

        self.current
            .as_ref()
            .map(|estimate| &estimate.vectors)
            .ok_or_else(|| SteeringError::Estimation("no steering estimate available".to_string()))
    }

    pub fn current(&self) -> Option<&SteeringEstimate> {
        self.current.as_ref()
    }

    /// Number of estimator calls that produced a usable estimate
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEstimator {
        calls: AtomicUsize,
        bins: usize,
    }

    impl SteeringEstimator for CountingEstimator {
        fn estimate(
            &self,
            window: &Window,
            _geometry: &ArrayGeometry,
            _sample_rate_hz: u32,
            _frame_size: usize,
        ) -> Result<SteeringEstimate, SteeringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SteeringEstimate {
                azimuth_deg: 0.0,
                elevation_deg: 0.0,
                vectors: SteeringVectorSet::unity(self.bins, window.channel_count()),
            })
        }
    }

    fn window(channels: usize) -> Window {
        Window::from_interleaved(0, &vec![0i16; 32 * channels], channels, false)
    }

    #[test]
    fn test_refresh_cadence() {
        let estimator = CountingEstimator { calls: AtomicUsize::new(0), bins: 9 };
        let geometry = ArrayGeometry::linear(2, 0.05);
        let mut cache = SteeringCache::new(2);

        for chunk in 0..6 {
            cache
                .vectors_for(chunk, &window(2), &estimator, &geometry, 16_000, 16)
                .unwrap();
        }
        // Chunks 0, 2 and 4
        assert_eq!(estimator.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.refresh_count(), 3);
    }

    #[test]
    fn test_empty_cache_always_estimates() {
        let estimator = CountingEstimator { calls: AtomicUsize::new(0), bins: 9 };
        let geometry = ArrayGeometry::linear(2, 0.05);
        let mut cache = SteeringCache::new(4);

        assert!(cache.needs_refresh(3));
        cache.vectors_for(3, &window(2), &estimator, &geometry, 16_000, 16).unwrap();
        assert!(!cache.needs_refresh(5));
        assert_eq!(estimator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let estimator = CountingEstimator { calls: AtomicUsize::new(0), bins: 5 };
        let geometry = ArrayGeometry::linear(2, 0.05);
        let mut cache = SteeringCache::new(2);

        let result = cache.vectors_for(0, &window(2), &estimator, &geometry, 16_000, 16);
        assert!(matches!(result, Err(SteeringError::ShapeMismatch { expected_bins: 9, .. })));
        assert!(cache.current().is_none());
    }
}
