// src/steering/mod.rs
//! Steering vectors for frequency-domain channel combination
//!
//! Direction-of-arrival estimation itself lives behind [`SteeringEstimator`].
//! This module owns what the enhancement core needs around it: the data types,
//! the refresh cache, and a fixed-direction estimator for known source layouts.

pub mod cache;
pub mod fixed_direction;
pub mod traits;
pub mod types;

pub use cache::SteeringCache;
pub use fixed_direction::FixedDirectionEstimator;
pub use traits::SteeringEstimator;
pub use types::{ArrayGeometry, SteeringError, SteeringEstimate, SteeringVectorSet};
