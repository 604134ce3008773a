//! Beamform-Core: real-time multi-channel speech enhancement
//!
//! This library turns a continuous stream of raw multi-microphone PCM into a single
//! enhanced PCM stream. It features:
//!
//! - Streaming ingestion of irregular, misaligned raw blocks
//! - Overlapping analysis windows with per-channel STFT
//! - Frequency-domain delay-and-sum combination driven by steering vectors
//! - Fixed-reference spectral subtraction and an adaptive MMSE noise tracker
//! - Overlap-add reconstruction across windows
//! - Independent sessions with cooperative start/stop
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use beamform_core::{FixedDirectionEstimator, Session, SessionConfig, samples_to_bytes};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::default();
//!     let session = Session::new("kitchen", config, Arc::new(FixedDirectionEstimator::new(0.0, 0.0)))?;
//!     let outputs = session.outputs();
//!
//!     session.start()?;
//!     let block = vec![0i16; 4 * 1024];
//!     session.push(&samples_to_bytes(&block));
//!     session.stop();
//!
//!     for enhanced in outputs.try_iter() {
//!         println!("{} samples", enhanced.len());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod processing;
pub mod session;
pub mod steering;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{StreamBuffer, Window, Windower};
pub use config::{ConfigError, ConfigLoader, FrameSize, SessionConfig};
pub use error::{EnhanceError, EnhanceResult, ErrorContext};
pub use processing::{
    EnhancementPipeline, NoiseTracker, NoiseTrackerState, ReferenceNoiseProfile, SingleChannelPostFilter,
    SpectralCombiner,
};
pub use session::{ControlCommand, Session, SessionEvent, SessionRegistry, SessionState};
pub use steering::{
    ArrayGeometry, FixedDirectionEstimator, SteeringError, SteeringEstimate, SteeringEstimator,
    SteeringVectorSet,
};
pub use utils::{bytes_to_samples, samples_to_bytes};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Real-time multi-channel speech enhancement".to_string(),
        features: vec![
            "Streaming multi-channel ingestion".to_string(),
            "Steering-vector channel combination".to_string(),
            "Adaptive noise tracking".to_string(),
            "Overlap-add reconstruction".to_string(),
            "Layered configuration management".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "beamform-core");
    }
}
