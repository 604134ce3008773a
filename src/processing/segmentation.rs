// src/processing/segmentation.rs
//! Hann-windowed framing and overlap-add reconstruction
//!
//! Framing and reconstruction are asymmetric: frames are Hann
//! weighted on analysis only, and overlap-add sums each frame's real part at its
//! hop position. At 50% overlap the Hann weights sum to roughly one, so the
//! interior of a signal comes back at unity gain, while the first and last
//! half-frame only receive a single tapered frame and come back attenuated.
//!
//! [`OverlapBuffer`] applies the same sum one level up, across whole processed
//! windows, and inherits the same reduced-energy first half-window.

use crate::error::{EnhanceError, EnhanceResult};
use crate::error_context;
use crate::utils::conversion::to_i16_saturating;
use std::f64::consts::PI;

/// Symmetric Hann window of `size` points
pub fn hann_window(size: usize) -> Vec<f64> {
    match size {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (size - 1) as f64).cos())
            .collect(),
    }
}

/// Hop between frames for the given overlap ratio
pub fn hop_size(frame_size: usize, overlap: f64) -> usize {
    ((frame_size as f64 * (1.0 - overlap)) as usize).max(1)
}

/// Split `signal` into Hann-weighted frames.
///
/// Produces `floor(N / hop) - 1` frames. A signal shorter than one frame yields a
/// single all-zero frame instead of an error.
pub fn framing(signal: &[f64], frame_size: usize, overlap: f64) -> Vec<Vec<f64>> {
    if frame_size == 0 {
        return Vec::new();
    }
    if signal.len() < frame_size {
        return vec![vec![0.0; frame_size]];
    }

    let window = hann_window(frame_size);
    let hop = hop_size(frame_size, overlap);
    let frame_count = (signal.len() / hop).saturating_sub(1);

    (0..frame_count)
        .map(|s| {
            let start = s * hop;
            signal[start..start + frame_size]
                .iter()
                .zip(&window)
                .map(|(&x, &w)| x * w)
                .collect()
        })
        .collect()
}

/// Reconstruct a time series from frames by summing each one at its hop offset.
///
/// Output length is `frames * frame_size * (1 - overlap) + frame_size / 2`. Every
/// frame is cast to int16 before it is added, and the running sum saturates.
pub fn overlap_add(frames: &[Vec<f64>], overlap: f64) -> Vec<i16> {
    let frame_size = match frames.first() {
        Some(frame) => frame.len(),
        None => return Vec::new(),
    };
    let hop = hop_size(frame_size, overlap);
    let total = (frames.len() as f64 * frame_size as f64 * (1.0 - overlap) + 0.5 * frame_size as f64) as usize;

    let mut output = vec![0i16; total];
    for (s, frame) in frames.iter().enumerate() {
        let start = s * hop;
        if start >= total {
            break;
        }
        for (out, &value) in output[start..].iter_mut().zip(frame) {
            *out = out.saturating_add(to_i16_saturating(value));
        }
    }
    output
}

/// Accumulates processed windows and releases the samples no later window can touch.
///
/// Consecutive windows overlap by `window_size - step`. Only that pending tail is
/// kept; the logical reconstruction grows by `window_size - step` per append.
#[derive(Debug, Clone)]
pub struct OverlapBuffer {
    window_size: usize,
    step: usize,
    tail: Vec<i32>,
    total_len: usize,
}

impl OverlapBuffer {
    pub fn new(window_size: usize, step: usize) -> Self {
        Self {
            window_size,
            step: step.min(window_size),
            tail: Vec::new(),
            total_len: 0,
        }
    }

    /// Add one processed window and return the `step` samples it completes.
    ///
    /// A window of the wrong length cannot be placed and is rejected without
    /// touching the buffer.
    pub fn append(&mut self, window: &[i16]) -> EnhanceResult<Vec<i16>> {
        if window.len() != self.window_size {
            return Err(EnhanceError::Reconstruction {
                expected: self.window_size,
                actual: window.len(),
                context: error_context!("overlap_buffer", "append"),
            });
        }

        let completed: Vec<i16> = window[..self.step]
            .iter()
            .enumerate()
            .map(|(i, &x)| saturate(self.tail.get(i).copied().unwrap_or(0) + x as i32))
            .collect();

        self.total_len = if self.total_len == 0 {
            self.window_size
        } else {
            self.total_len + self.window_size - self.step
        };
        self.tail = window[self.step..].iter().map(|&x| x as i32).collect();

        Ok(completed)
    }

    /// Overlap-add a final, possibly shorter window at the tail position and
    /// release everything that remains.
    pub fn finish(&mut self, partial: Option<&[i16]>) -> Vec<i16> {
        let partial = partial.unwrap_or(&[]);
        let len = self.tail.len().max(partial.len());

        let output = (0..len)
            .map(|i| {
                let tail = self.tail.get(i).copied().unwrap_or(0);
                let extra = partial.get(i).map(|&x| x as i32).unwrap_or(0);
                saturate(tail + extra)
            })
            .collect();

        self.total_len += partial.len().saturating_sub(self.tail.len());
        self.tail.clear();
        output
    }

    /// Length of the logical reconstruction so far
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Samples held back waiting for the next window
    pub fn pending(&self) -> usize {
        self.tail.len()
    }

    pub fn reset(&mut self) {
        self.tail.clear();
        self.total_len = 0;
    }
}

fn saturate(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, freq: f64, sample_rate: f64, amplitude: f64) -> Vec<f64> {
        (0..len)
            .map(|n| amplitude * (2.0 * PI * freq * n as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(10);
        assert_eq!(window.len(), 10);
        assert!(window[0].abs() < 1e-12);
        assert!(window[9].abs() < 1e-12);
        assert!((window[4] - window[5]).abs() < 1e-12);
        assert_eq!(hann_window(1), vec![1.0]);
    }

    #[test]
    fn test_frame_count() {
        let signal = vec![1.0; 4096];
        let frames = framing(&signal, 256, 0.5);
        assert_eq!(frames.len(), 4096 / 128 - 1);
        assert!(frames.iter().all(|f| f.len() == 256));
    }

    #[test]
    fn test_short_signal_yields_zero_frame() {
        let frames = framing(&[1.0; 100], 256, 0.5);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_overlap_add_length() {
        let frames = vec![vec![0.0; 256]; 31];
        assert_eq!(overlap_add(&frames, 0.5).len(), 4096);
        assert!(overlap_add(&[], 0.5).is_empty());
    }

    #[test]
    fn test_round_trip_interior_and_attenuated_edges() {
        let frame = 256;
        let hop = frame / 2;
        let input = sine(8192, 440.0, 16_000.0, 8000.0);
        let output = overlap_add(&framing(&input, frame, 0.5), 0.5);
        assert_eq!(output.len(), input.len());

        // Interior reconstructs within the Hann ripple plus int16 truncation
        for n in hop..input.len() - hop {
            let error = (output[n] as f64 - input[n]).abs();
            assert!(error <= 0.01 * 8000.0 + 2.0, "sample {} off by {}", n, error);
        }

        // The first half-frame only sees one rising taper
        let edge_energy: f64 = output[..hop].iter().map(|&x| (x as f64).powi(2)).sum();
        let input_energy: f64 = input[..hop].iter().map(|x| x.powi(2)).sum();
        assert!(edge_energy < 0.75 * input_energy);
    }

    #[test]
    fn test_overlap_buffer_emits_step_per_window() {
        let mut buffer = OverlapBuffer::new(8, 4);

        let first = buffer.append(&[1; 8]).unwrap();
        assert_eq!(first, vec![1; 4]);
        assert_eq!(buffer.total_len(), 8);

        let second = buffer.append(&[2; 8]).unwrap();
        assert_eq!(second, vec![3; 4]);
        assert_eq!(buffer.total_len(), 12);
        assert_eq!(buffer.pending(), 4);
    }

    #[test]
    fn test_overlap_buffer_rejects_wrong_length() {
        let mut buffer = OverlapBuffer::new(8, 4);
        buffer.append(&[1; 8]).unwrap();
        assert!(matches!(
            buffer.append(&[1; 6]),
            Err(EnhanceError::Reconstruction { expected: 8, actual: 6, .. })
        ));
        assert_eq!(buffer.total_len(), 8);
        assert_eq!(buffer.pending(), 4);
    }

    #[test]
    fn test_overlap_buffer_finish() {
        let mut buffer = OverlapBuffer::new(8, 4);
        buffer.append(&[1; 8]).unwrap();

        let rest = buffer.finish(Some(&[5, 5, 5, 5, 5, 5]));
        assert_eq!(rest, vec![6, 6, 6, 6, 5, 5]);
        assert_eq!(buffer.pending(), 0);

        assert!(buffer.finish(None).is_empty());
    }

    #[test]
    fn test_overlap_buffer_saturates() {
        let mut buffer = OverlapBuffer::new(4, 2);
        buffer.append(&[i16::MAX; 4]).unwrap();
        assert_eq!(buffer.append(&[i16::MAX; 4]).unwrap(), vec![i16::MAX; 2]);
    }
}
