// src/acquisition/stream_buffer.rs
//! Validation and queuing of raw interleaved PCM blocks
//!
//! Producers deliver blocks at irregular sizes and times. Each block is zero
//! padded to a whole number of rows, reshaped to `rows x channels`, and either
//! queued for the windower or dropped when it is too short to be useful.

use crate::utils::conversion::bytes_to_samples;
use crossbeam::channel::{unbounded, Receiver, Sender};
use ndarray::Array2;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One validated block, `rows x channels`
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Array2<i16>,
}

impl AudioBlock {
    pub fn new(samples: Array2<i16>) -> Self {
        Self { samples }
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
}

/// What happened to a pushed block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted { rows: usize, padded: bool },
    /// Too short; only the drop counter changed
    Dropped { rows: usize },
    /// The consuming side has gone away
    Disconnected,
}

/// Ingest counters shared with the owning session
#[derive(Debug, Default)]
pub struct IngestCounters {
    received: AtomicU64,
    accepted: AtomicU64,
    padded: AtomicU64,
    dropped: AtomicU64,
    rows_accepted: AtomicU64,
}

impl IngestCounters {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn padded(&self) -> u64 {
        self.padded.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn rows_accepted(&self) -> u64 {
        self.rows_accepted.load(Ordering::Relaxed)
    }
}

/// Pad `samples` to a multiple of `channel_count` and reshape to rows.
///
/// Returns the block and whether padding was needed.
pub fn shape_block(samples: &[i16], channel_count: usize) -> (Array2<i16>, bool) {
    let channels = channel_count.max(1);
    let remainder = samples.len() % channels;
    let padded = remainder != 0;
    let total = if padded { samples.len() + channels - remainder } else { samples.len() };
    let rows = total / channels;

    let block = Array2::from_shape_fn((rows, channels), |(r, c)| {
        samples.get(r * channels + c).copied().unwrap_or(0)
    });
    (block, padded)
}

/// Producer end of the block queue
#[derive(Debug)]
pub struct StreamBuffer {
    channel_count: usize,
    min_rows: usize,
    sender: Sender<AudioBlock>,
    counters: Arc<IngestCounters>,
}

impl StreamBuffer {
    /// Create a buffer and the receiver its blocks arrive on
    pub fn channel(channel_count: usize, min_rows: usize) -> (Self, Receiver<AudioBlock>) {
        let (sender, receiver) = unbounded();
        (
            Self {
                channel_count,
                min_rows,
                sender,
                counters: Arc::new(IngestCounters::default()),
            },
            receiver,
        )
    }

    /// Share counters with an owner that outlives the buffer
    pub fn with_counters(mut self, counters: Arc<IngestCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn counters(&self) -> Arc<IngestCounters> {
        self.counters.clone()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Validate and queue a raw little-endian int16 block
    pub fn push_bytes(&self, bytes: &[u8]) -> IngestOutcome {
        self.push_samples(&bytes_to_samples(bytes))
    }

    /// Validate and queue an interleaved sample block
    pub fn push_samples(&self, samples: &[i16]) -> IngestOutcome {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let (block, padded) = shape_block(samples, self.channel_count);
        let rows = block.nrows();

        if rows <= self.min_rows {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(rows, min_rows = self.min_rows, "dropping short block");
            return IngestOutcome::Dropped { rows };
        }
        if padded {
            self.counters.padded.fetch_add(1, Ordering::Relaxed);
            debug!(
                samples = samples.len(),
                channels = self.channel_count,
                "zero-padded misaligned block"
            );
        }

        match self.sender.send(AudioBlock::new(block)) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                self.counters.rows_accepted.fetch_add(rows as u64, Ordering::Relaxed);
                IngestOutcome::Accepted { rows, padded }
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                IngestOutcome::Disconnected
            }
        }
    }
}
