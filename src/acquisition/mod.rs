// src/acquisition/mod.rs
//! Stream ingestion and windowing

pub mod stream_buffer;
pub mod windower;

pub use stream_buffer::{shape_block, AudioBlock, IngestCounters, IngestOutcome, StreamBuffer};
pub use windower::{Window, Windower};
