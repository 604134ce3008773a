// src/processing/noise_reduction/noise_tracker.rs
//! Adaptive noise PSD tracking with speech presence probability
//!
//! [`NoiseTracker::track`] is a pure step: it takes the PSD of the current
//! segment plus the state left by the previous segment and returns the new noise
//! estimate together with the next state. Nothing is kept inside the tracker
//! except its parameters and the matrix cache.
//!
//! The first segment of a cold state is assumed to be noise only. After that each
//! bin blends the current PSD with the previous noise estimate, weighted by the
//! probability that the bin carries speech. That probability is driven by the
//! SNR of the current PSD against its minimum-statistics variance.

use crate::config::constants::noise_tracking;
use crate::processing::spectrum::{exponential_smoothing, MatrixCache};
use crate::utils::math::{div0, interp};
use std::sync::Arc;

/// Tracker tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseTrackerParams {
    /// A-priori SNR assumed when speech is present
    pub snr_h1: f64,
    /// A-priori probability of speech absence
    pub p_h0: f64,
    /// Fraction of the spectrum spanned by the minimum-statistics window
    pub q_window: f64,
    /// Exponential smoothing factor for the variance (larger is smoother)
    pub alpha: f64,
    pub shape: f64,
    /// Decision-directed weight for the a-priori SNR
    pub alpha_snr: f64,
}

impl Default for NoiseTrackerParams {
    fn default() -> Self {
        Self {
            snr_h1: noise_tracking::SNR_H1,
            p_h0: noise_tracking::P_H0,
            q_window: noise_tracking::Q_WINDOW,
            alpha: noise_tracking::ALPHA,
            shape: noise_tracking::SHAPE,
            alpha_snr: noise_tracking::ALPHA_SNR,
        }
    }
}

/// Per-bin SNR history and the resulting speech presence probability
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechPresenceState {
    pub a_priori_snr: Vec<f64>,
    pub a_posteriori_snr: Vec<f64>,
    pub probability: Vec<f64>,
}

/// State threaded from one segment to the next. Empty at session start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoiseTrackerState {
    /// Previous noise PSD estimate
    pub noise_psd: Option<Vec<f64>>,
    /// PSD of the previous enhanced segment
    pub speech_psd: Option<Vec<f64>>,
    /// Smoothed minimum-statistics variance from the last step
    pub variance: Option<Vec<f64>>,
    pub speech_presence: Option<SpeechPresenceState>,
}

impl NoiseTrackerState {
    pub fn is_cold(&self) -> bool {
        self.noise_psd.is_none()
    }

    /// Record the PSD of the segment just enhanced with the latest noise estimate
    pub fn with_speech_psd(mut self, speech_psd: Vec<f64>) -> Self {
        self.speech_psd = Some(speech_psd);
        self
    }
}

/// Noise estimate for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseEstimate {
    pub noise_psd: Vec<f64>,
    pub speech_presence: Option<SpeechPresenceState>,
}

/// MMSE noise PSD tracker
#[derive(Debug, Clone)]
pub struct NoiseTracker {
    params: NoiseTrackerParams,
    cache: Arc<MatrixCache>,
}

impl NoiseTracker {
    pub fn new(params: NoiseTrackerParams, cache: Arc<MatrixCache>) -> Self {
        Self { params, cache }
    }

    pub fn params(&self) -> &NoiseTrackerParams {
        &self.params
    }

    /// Estimate the noise PSD of `pyy` given the previous state
    pub fn track(&self, pyy: &[f64], state: NoiseTrackerState) -> (NoiseEstimate, NoiseTrackerState) {
        let p = &self.params;
        let variance = minimum_statistics_variance(pyy, p.q_window, p.alpha, &self.cache);

        let (noise_psd, speech_presence) = match state.noise_psd.as_deref() {
            None => (pyy.to_vec(), None),
            Some(previous) => {
                let presence = speech_presence(pyy, &variance, state.speech_psd.as_deref(), p);
                let noise = pyy
                    .iter()
                    .zip(previous)
                    .zip(&presence.probability)
                    .map(|((&y, &n), &spp)| (1.0 - spp) * y + spp * n)
                    .collect();
                (noise, Some(presence))
            }
        };

        let noise_psd: Vec<f64> = noise_psd.into_iter().map(|x| x.max(f64::MIN_POSITIVE)).collect();

        let next = NoiseTrackerState {
            noise_psd: Some(noise_psd.clone()),
            speech_psd: state.speech_psd,
            variance: Some(variance),
            speech_presence: speech_presence.clone(),
        };
        (NoiseEstimate { noise_psd, speech_presence }, next)
    }
}

/// Speech presence probability for a given a-posteriori SNR
pub fn speech_presence_probability(a_posteriori_snr: f64, params: &NoiseTrackerParams) -> f64 {
    let p_h1 = 1.0 - params.p_h0;
    let exponent = -params.shape * a_posteriori_snr * (params.snr_h1 / (1.0 + params.snr_h1));
    1.0 / (1.0 + (params.p_h0 / p_h1) * (1.0 + params.snr_h1).powf(params.shape) * exponent.exp())
}

/// SNRs are taken against `variance`, not the previous noise estimate
fn speech_presence(
    pyy: &[f64],
    variance: &[f64],
    speech_prev: Option<&[f64]>,
    params: &NoiseTrackerParams,
) -> SpeechPresenceState {
    let a_posteriori_snr: Vec<f64> = pyy.iter().zip(variance).map(|(&y, &v)| div0(y, v)).collect();

    let a_priori_snr = match speech_prev {
        Some(speech) => a_posteriori_snr
            .iter()
            .zip(speech)
            .zip(variance)
            .map(|((&post, &s), &n)| {
                (params.alpha_snr * div0(s, n) + (1.0 - params.alpha_snr) * (post - 1.0))
                    .max(f64::MIN_POSITIVE)
            })
            .collect(),
        None => a_posteriori_snr
            .iter()
            .map(|&post| (post - 1.0).max(f64::MIN_POSITIVE))
            .collect(),
    };

    let probability = a_posteriori_snr
        .iter()
        .map(|&post| speech_presence_probability(post, params))
        .collect();

    SpeechPresenceState {
        a_priori_snr,
        a_posteriori_snr,
        probability,
    }
}

/// Empirical bias `M(d)` of the minimum-statistics estimator
pub fn variance_bias(d: usize) -> f64 {
    interp(d as f64, &noise_tracking::BIAS_TABLE)
}

/// Minimum-statistics variance of a PSD, exponentially smoothed along the bins.
///
/// Each index looks back over at most `d = round(L * q_window)` preceding values;
/// the first index only sees itself.
pub fn minimum_statistics_variance(pyy: &[f64], q_window: f64, alpha: f64, cache: &MatrixCache) -> Vec<f64> {
    let len = pyy.len();
    if len == 0 {
        return Vec::new();
    }

    let d = ((len as f64 * q_window).round_ties_even() as usize).max(1);
    let m_d = variance_bias(d);
    let spread = (d - 1) as f64;

    let raw: Vec<f64> = (0..len)
        .map(|l| {
            let window = if l == 0 { &pyy[..1] } else { &pyy[l.saturating_sub(d)..l] };
            window
                .iter()
                .map(|&q| 1.0 + spread * div0(2.0, (q - 2.0 * m_d) / (1.0 - m_d)))
                .fold(f64::INFINITY, f64::min)
        })
        .collect();

    exponential_smoothing(&raw, alpha, cache)
}
