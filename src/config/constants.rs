// src/config/constants.rs
//! System-wide configuration constants

/// Stream and array constants
pub mod signal {
    pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 48_000;
    pub const DEFAULT_CHANNEL_COUNT: usize = 4;
    pub const MIN_CHANNEL_COUNT: usize = 1;
    pub const MAX_CHANNEL_COUNT: usize = 32;

    /// Samples per channel handed to one pipeline run
    pub const DEFAULT_WINDOW_SIZE: usize = 4096;
    /// Analysis frame used for the per-channel STFT
    pub const DEFAULT_FRAME_SIZE: usize = 256;
    pub const DEFAULT_FRAME_OVERLAP: f64 = 0.5;

    /// Raw blocks reshaping to this many rows or fewer are discarded
    pub const MIN_ROWS_PER_BLOCK: usize = 27;
}

/// Steering-vector collaborator constants
pub mod steering {
    pub const DEFAULT_REFRESH_INTERVAL: usize = 2;
    pub const SPEED_OF_SOUND_M_S: f64 = 343.2;

    /// Head-mounted four microphone array, metres (x, y, z)
    pub const DEFAULT_MIC_POSITIONS: [[f64; 3]; 4] = [
        [0.0343, 0.0313, 0.0],
        [-0.0343, 0.0313, 0.0],
        [0.0343, -0.0267, 0.0],
        [-0.0343, -0.0267, 0.0],
    ];
}

/// Fixed-reference pre-subtraction constants
pub mod pre_processing {
    pub const DEFAULT_ENABLED: bool = false;
    pub const DEFAULT_WARMUP_CHUNKS: usize = 2;
    pub const DEFAULT_FLOOR: f64 = 0.1;
    pub const DEFAULT_PSD_WINDOW_FACTOR: f64 = 1.0;
}

/// Single-channel post-filter constants
pub mod post_filter {
    pub const DEFAULT_ENABLED: bool = false;
    pub const DEFAULT_FRAME_SIZE: usize = 1024;
    pub const DEFAULT_PSD_WINDOW_FACTOR: f64 = 0.015_625; // 2^-6
    pub const DEFAULT_VARIANCE_WINDOW_FACTOR: f64 = 0.25; // 2^-2
    pub const DEFAULT_WIENER_FLOOR: f64 = 0.2;
    pub const DEFAULT_LOW_HZ: f64 = 300.0;
    pub const DEFAULT_HIGH_HZ: f64 = 3400.0;
}

/// Noise tracker defaults
pub mod noise_tracking {
    pub const SNR_H1: f64 = 0.5;
    pub const P_H0: f64 = 0.5;
    pub const Q_WINDOW: f64 = 0.01;
    pub const ALPHA: f64 = 0.05;
    pub const SHAPE: f64 = 2.0;
    /// Decision-directed a-priori SNR weight
    pub const ALPHA_SNR: f64 = 0.98;

    /// Empirical (d, M(d)) pairs for the minimum-statistics variance bias
    pub const BIAS_TABLE: [(f64, f64); 14] = [
        (1.0, 0.0),
        (2.0, 0.26),
        (5.0, 0.48),
        (8.0, 0.58),
        (10.0, 0.61),
        (15.0, 0.668),
        (20.0, 0.705),
        (30.0, 0.762),
        (40.0, 0.8),
        (60.0, 0.841),
        (80.0, 0.865),
        (120.0, 0.89),
        (140.0, 0.9),
        (160.0, 0.91),
    ];
}

/// Configuration file and environment constants
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "beamform.toml";
    pub const LOCAL_CONFIG_FILE: &str = "beamform.local.toml";
    pub const ENV_PREFIX: &str = "BEAMFORM";
    pub const ENV_SEPARATOR: &str = "__";
}
