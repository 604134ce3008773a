// src/acquisition/windower.rs
//! Overlapping analysis windows over the block queue
//!
//! Rows accumulate until a full window of `W` rows is available. Each emitted
//! window advances the read position by `step = W / 2` rows, so every row appears
//! in two consecutive windows. When the producer side disconnects the queue is
//! drained and whatever remains leaves as one final, shorter window.

use super::stream_buffer::AudioBlock;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use ndarray::{Array2, ArrayView1};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Poll period while waiting on an empty queue with an active flag attached
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One analysis window, `rows x channels`
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    index: usize,
    is_final: bool,
    samples: Array2<i16>,
}

impl Window {
    pub fn new(index: usize, samples: Array2<i16>, is_final: bool) -> Self {
        Self { index, is_final, samples }
    }

    /// Build a window from interleaved samples; a trailing partial row is ignored
    pub fn from_interleaved(index: usize, samples: &[i16], channel_count: usize, is_final: bool) -> Self {
        let channels = channel_count.max(1);
        let rows = samples.len() / channels;
        let data = Array2::from_shape_fn((rows, channels), |(r, c)| samples[r * channels + c]);
        Self::new(index, data, is_final)
    }

    /// Position of this window in the session, starting at zero
    pub fn index(&self) -> usize {
        self.index
    }

    /// True for the shorter window flushed at end of stream
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn rows(&self) -> usize {
        self.samples.nrows()
    }

    pub fn channel_count(&self) -> usize {
        self.samples.ncols()
    }

    pub fn samples(&self) -> &Array2<i16> {
        &self.samples
    }

    pub fn column(&self, channel: usize) -> ArrayView1<'_, i16> {
        self.samples.column(channel)
    }

    /// One channel as floating point
    pub fn channel(&self, channel: usize) -> Vec<f64> {
        self.samples.column(channel).iter().map(|&x| x as f64).collect()
    }
}

/// Blocking iterator of overlapping windows
#[derive(Debug)]
pub struct Windower {
    receiver: Receiver<AudioBlock>,
    window_size: usize,
    step: usize,
    channel_count: usize,
    pending: Vec<i16>,
    next_index: usize,
    active: Option<Arc<AtomicBool>>,
    poll_interval: Duration,
    closed: bool,
    finished: bool,
}

impl Windower {
    pub fn new(receiver: Receiver<AudioBlock>, window_size: usize, channel_count: usize) -> Self {
        Self {
            receiver,
            window_size,
            step: (window_size / 2).max(1),
            channel_count: channel_count.max(1),
            pending: Vec::new(),
            next_index: 0,
            active: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            closed: false,
            finished: false,
        }
    }

    /// Poll the queue instead of blocking, and close once `active` clears
    pub fn with_active_flag(mut self, active: Arc<AtomicBool>, poll_interval: Duration) -> Self {
        self.active = Some(active);
        self.poll_interval = poll_interval;
        self
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Rows buffered but not yet released
    pub fn pending_rows(&self) -> usize {
        self.pending.len() / self.channel_count
    }

    /// False once the final window has been produced
    pub fn has_more(&self) -> bool {
        !self.finished
    }

    /// Stop pulling new blocks; queued blocks are still drained
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Number of windows produced so far
    pub fn windows_emitted(&self) -> usize {
        self.next_index
    }

    fn append(&mut self, block: AudioBlock) {
        if block.channel_count() != self.channel_count {
            return;
        }
        self.pending.extend(block.samples().iter().copied());
    }

    fn take_window(&mut self) -> Window {
        let width = self.window_size * self.channel_count;
        let window = Window::from_interleaved(self.next_index, &self.pending[..width], self.channel_count, false);
        self.pending.drain(..self.step * self.channel_count);
        self.next_index += 1;
        trace!(index = window.index(), pending_rows = self.pending_rows(), "window ready");
        window
    }

    fn take_final(&mut self) -> Option<Window> {
        self.finished = true;
        if self.pending.is_empty() {
            return None;
        }
        let window = Window::from_interleaved(self.next_index, &self.pending, self.channel_count, true);
        self.pending.clear();
        self.next_index += 1;
        trace!(index = window.index(), rows = window.rows(), "final partial window");
        Some(window)
    }
}

impl Iterator for Windower {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.finished {
            return None;
        }

        loop {
            if self.pending_rows() >= self.window_size {
                return Some(self.take_window());
            }

            let block = if self.closed {
                self.receiver.try_recv().ok()
            } else if let Some(active) = &self.active {
                match self.receiver.recv_timeout(self.poll_interval) {
                    Ok(block) => Some(block),
                    Err(RecvTimeoutError::Timeout) => {
                        if !active.load(Ordering::Acquire) {
                            self.closed = true;
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => None,
                }
            } else {
                self.receiver.recv().ok()
            };

            match block {
                Some(block) => self.append(block),
                None => return self.take_final(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::stream_buffer::StreamBuffer;

    fn ramp(rows: usize, channels: usize, start: i16) -> Vec<i16> {
        (0..rows * channels).map(|i| start + (i / channels) as i16).collect()
    }

    #[test]
    fn test_windows_overlap_by_half() {
        let (buffer, receiver) = StreamBuffer::channel(2, 0);
        buffer.push_samples(&ramp(16, 2, 0));
        drop(buffer);

        let windows: Vec<Window> = Windower::new(receiver, 8, 2).collect();
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].column(0).to_vec(), (0..8).collect::<Vec<i16>>());
        assert_eq!(windows[1].column(0).to_vec(), (4..12).collect::<Vec<i16>>());
        assert_eq!(windows[2].column(1).to_vec(), (8..16).collect::<Vec<i16>>());

        // Final window is the remaining half step
        assert!(windows[3].is_final());
        assert_eq!(windows[3].rows(), 4);
        assert_eq!(windows[3].index(), 3);
    }

    #[test]
    fn test_blocks_accumulate_across_boundaries() {
        let (buffer, receiver) = StreamBuffer::channel(1, 0);
        buffer.push_samples(&[1, 2, 3]);
        buffer.push_samples(&[4, 5]);
        buffer.push_samples(&[6, 7, 8, 9]);
        drop(buffer);

        let mut windower = Windower::new(receiver, 4, 1);
        assert_eq!(windower.next().unwrap().column(0).to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(windower.next().unwrap().column(0).to_vec(), vec![3, 4, 5, 6]);
        assert_eq!(windower.next().unwrap().column(0).to_vec(), vec![5, 6, 7, 8]);
        let last = windower.next().unwrap();
        assert!(last.is_final());
        assert_eq!(last.column(0).to_vec(), vec![7, 8, 9]);
        assert!(windower.next().is_none());
        assert!(!windower.has_more());
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        let (buffer, receiver) = StreamBuffer::channel(2, 0);
        drop(buffer);
        let mut windower = Windower::new(receiver, 8, 2);
        assert!(windower.next().is_none());
        assert_eq!(windower.windows_emitted(), 0);
    }

    #[test]
    fn test_close_drains_queued_blocks_without_blocking() {
        let (buffer, receiver) = StreamBuffer::channel(1, 0);
        buffer.push_samples(&[1, 2, 3, 4, 5, 6]);

        let mut windower = Windower::new(receiver, 4, 1);
        windower.close();
        let windows: Vec<Window> = windower.by_ref().collect();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[1].column(0).to_vec(), vec![3, 4, 5, 6]);
        assert!(!windows[1].is_final());
        assert_eq!(windows[2].column(0).to_vec(), vec![5, 6]);
        assert!(windows[2].is_final());
        drop(buffer);
    }

    #[test]
    fn test_cleared_active_flag_ends_stream() {
        let (buffer, receiver) = StreamBuffer::channel(1, 0);
        buffer.push_samples(&[1, 2, 3, 4, 5]);

        let active = Arc::new(AtomicBool::new(false));
        let windower = Windower::new(receiver, 4, 1).with_active_flag(active, Duration::from_millis(1));
        let windows: Vec<Window> = windower.collect();

        // The producer is still alive; the flag alone ends iteration
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].column(0).to_vec(), vec![3, 4, 5]);
        drop(buffer);
    }
}
