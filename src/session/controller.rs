// src/session/controller.rs
//! One enhancement session: an ingest thread and a processing thread
//!
//! The ingest thread receives raw byte blocks, validates them through a
//! [`StreamBuffer`] and queues them. The processing thread turns the queue into
//! overlapping windows and runs the [`EnhancementPipeline`] on each, emitting
//! PCM blocks in order on the output channel.
//!
//! Stopping is cooperative. `stop` signals the ingest thread, which drains what
//! was already pushed and then marks itself finished; the processing thread
//! notices on its next poll, drains the queue, flushes the final partial window
//! and exits. A steering failure ends the session early with a
//! [`SessionEvent::Stopped`] event.

use super::command::{ControlCommand, SessionEvent};
use super::state::SessionState;
use crate::acquisition::{windower::DEFAULT_POLL_INTERVAL, IngestCounters, StreamBuffer, Windower};
use crate::config::SessionConfig;
use crate::error::{EnhanceError, EnhanceResult};
use crate::processing::{EnhancementPipeline, ReferenceNoiseProfile};
use crate::steering::{ArrayGeometry, SteeringEstimator};
use crossbeam::channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Microphone spacing for generated linear geometries, metres
const DEFAULT_LINEAR_SPACING_M: f64 = 0.05;

/// Live counters for one run of a session
#[derive(Debug, Default)]
pub struct SessionStats {
    ingest: Arc<IngestCounters>,
    windows_processed: AtomicU64,
    samples_emitted: AtomicU64,
    steering_refreshes: AtomicU64,
    threads_spawned: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    pub blocks_received: u64,
    pub blocks_accepted: u64,
    pub blocks_padded: u64,
    pub blocks_dropped: u64,
    pub windows_processed: u64,
    pub samples_emitted: u64,
    pub steering_refreshes: u64,
    pub threads_spawned: u64,
}

impl SessionStats {
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            blocks_received: self.ingest.received(),
            blocks_accepted: self.ingest.accepted(),
            blocks_padded: self.ingest.padded(),
            blocks_dropped: self.ingest.dropped(),
            windows_processed: self.windows_processed.load(Ordering::Relaxed),
            samples_emitted: self.samples_emitted.load(Ordering::Relaxed),
            steering_refreshes: self.steering_refreshes.load(Ordering::Relaxed),
            threads_spawned: self.threads_spawned.load(Ordering::Relaxed),
        }
    }
}

struct SessionRuntime {
    raw_tx: Sender<Vec<u8>>,
    stop_tx: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

/// A single enhancement session
pub struct Session {
    id: String,
    config: SessionConfig,
    estimator: Arc<dyn SteeringEstimator>,
    geometry: ArrayGeometry,
    profile: Option<ReferenceNoiseProfile>,
    state: Arc<Mutex<SessionState>>,
    active: Arc<AtomicBool>,
    stats: Mutex<Arc<SessionStats>>,
    runtime: Mutex<Option<SessionRuntime>>,
    output_tx: Sender<Vec<i16>>,
    output_rx: Receiver<Vec<i16>>,
    event_tx: Sender<SessionEvent>,
    event_rx: Receiver<SessionEvent>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("channels", &self.config.channel_count)
            .finish()
    }
}

impl Session {
    /// Create an idle session. Invalid configuration is rejected here.
    pub fn new(
        id: impl Into<String>,
        config: SessionConfig,
        estimator: Arc<dyn SteeringEstimator>,
    ) -> EnhanceResult<Self> {
        config.validate()?;
        let geometry = default_geometry(config.channel_count);
        let (output_tx, output_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();

        Ok(Self {
            id: id.into(),
            config,
            estimator,
            geometry,
            profile: None,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            active: Arc::new(AtomicBool::new(false)),
            stats: Mutex::new(Arc::new(SessionStats::default())),
            runtime: Mutex::new(None),
            output_tx,
            output_rx,
            event_tx,
            event_rx,
        })
    }

    pub fn with_geometry(mut self, geometry: ArrayGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Reference noise profile for pre-subtraction, instead of the configured file
    pub fn with_reference_profile(mut self, profile: ReferenceNoiseProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Enhanced PCM blocks, in order
    pub fn outputs(&self) -> Receiver<Vec<i16>> {
        self.output_rx.clone()
    }

    pub fn events(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    pub fn stats(&self) -> SessionStatsSnapshot {
        self.stats.lock().snapshot()
    }

    /// Apply a control command; returns whether it changed anything
    pub fn handle(&self, command: ControlCommand) -> EnhanceResult<bool> {
        match command {
            ControlCommand::Start => self.start(),
            ControlCommand::Stop => Ok(self.stop()),
        }
    }

    /// Spawn the ingest and processing threads.
    ///
    /// Returns `Ok(false)` without side effects when the session is already
    /// active. Pipeline construction errors abort the start.
    pub fn start(&self) -> EnhanceResult<bool> {
        // Held across the flag transition so start and stop serialize
        let mut runtime = self.runtime.lock();
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(session = %self.id, "start ignored: session already active");
            return Ok(false);
        }

        if let Some(previous) = runtime.take() {
            previous.shutdown(&self.id);
        }

        let pipeline = match EnhancementPipeline::new(
            &self.config,
            self.estimator.clone(),
            self.geometry.clone(),
            self.profile.clone(),
        ) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                self.active.store(false, Ordering::Release);
                error!(session = %self.id, error = %err, "session start aborted");
                return Err(err);
            }
        };

        let stats = Arc::new(SessionStats::default());
        *self.stats.lock() = stats.clone();

        let (buffer, block_rx) =
            StreamBuffer::channel(self.config.channel_count, self.config.min_rows_per_block);
        let buffer = buffer.with_counters(stats.ingest.clone());
        let (raw_tx, raw_rx) = unbounded::<Vec<u8>>();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(0);
        let producing = Arc::new(AtomicBool::new(true));

        set_state(&self.state, SessionState::Started, &self.id);
        let _ = self.event_tx.send(SessionEvent::Started);

        let ingest = IngestTask {
            buffer,
            raw_rx,
            stop_rx,
            done_rx,
            producing: producing.clone(),
        };
        let ingest_handle = match spawn_named(format!("beamform-ingest-{}", self.id), move || ingest.run()) {
            Ok(handle) => handle,
            Err(err) => return Err(self.abort_start(err)),
        };
        stats.threads_spawned.fetch_add(1, Ordering::Relaxed);

        let windower = Windower::new(block_rx, self.config.window_size, self.config.channel_count)
            .with_active_flag(producing, DEFAULT_POLL_INTERVAL);
        let processing = ProcessingTask {
            id: self.id.clone(),
            pipeline,
            windower,
            output_tx: self.output_tx.clone(),
            event_tx: self.event_tx.clone(),
            state: self.state.clone(),
            active: self.active.clone(),
            stats: stats.clone(),
            _done_tx: done_tx,
        };
        let processing_handle =
            match spawn_named(format!("beamform-processing-{}", self.id), move || processing.run()) {
                Ok(handle) => handle,
                Err(err) => {
                    // Dropping the senders releases the ingest thread
                    drop(raw_tx);
                    drop(stop_tx);
                    let _ = ingest_handle.join();
                    return Err(self.abort_start(err));
                }
            };
        stats.threads_spawned.fetch_add(1, Ordering::Relaxed);

        *runtime = Some(SessionRuntime {
            raw_tx,
            stop_tx,
            handles: vec![ingest_handle, processing_handle],
        });

        info!(
            session = %self.id,
            channels = self.config.channel_count,
            sample_rate_hz = self.config.sample_rate_hz,
            "session started"
        );
        Ok(true)
    }

    /// Stop the session and wait for both threads to finish.
    ///
    /// Everything pushed before the call is processed and emitted. Returns
    /// `false` when the session was not active.
    pub fn stop(&self) -> bool {
        let mut runtime = self.runtime.lock();
        if self
            .active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(session = %self.id, state = %self.state(), "stop ignored: session not active");
            if let Some(finished) = runtime.take() {
                finished.shutdown(&self.id);
            }
            return false;
        }

        set_state(&self.state, SessionState::Stopping, &self.id);
        if let Some(running) = runtime.take() {
            running.shutdown(&self.id);
        }

        let mut state = self.state.lock();
        if state.is_active() {
            *state = SessionState::Stopped;
        }
        drop(state);

        info!(session = %self.id, stats = ?self.stats(), "session stopped");
        true
    }

    /// Queue a raw little-endian int16 block; `false` when the session is not running
    pub fn push(&self, bytes: &[u8]) -> bool {
        if !self.is_active() {
            trace!(session = %self.id, bytes = bytes.len(), "block ignored: session not active");
            return false;
        }
        match self.runtime.lock().as_ref() {
            Some(runtime) => runtime.raw_tx.send(bytes.to_vec()).is_ok(),
            None => false,
        }
    }

    fn abort_start(&self, err: std::io::Error) -> EnhanceError {
        self.active.store(false, Ordering::Release);
        set_state(&self.state, SessionState::Stopped, &self.id);
        error!(session = %self.id, error = %err, "failed to spawn session thread");
        EnhanceError::session("start", format!("failed to spawn thread for session {}: {}", self.id, err))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.is_active() {
            self.stop();
        } else if let Some(finished) = self.runtime.lock().take() {
            finished.shutdown(&self.id);
        }
    }
}

impl SessionRuntime {
    fn shutdown(self, id: &str) {
        let _ = self.stop_tx.try_send(());
        drop(self.raw_tx);
        drop(self.stop_tx);
        for handle in self.handles {
            if handle.join().is_err() {
                error!(session = %id, "session thread panicked");
            }
        }
    }
}

struct IngestTask {
    buffer: StreamBuffer,
    raw_rx: Receiver<Vec<u8>>,
    stop_rx: Receiver<()>,
    done_rx: Receiver<()>,
    producing: Arc<AtomicBool>,
}

impl IngestTask {
    fn run(self) {
        loop {
            select! {
                recv(self.raw_rx) -> msg => match msg {
                    Ok(bytes) => {
                        self.buffer.push_bytes(&bytes);
                    }
                    Err(_) => break,
                },
                recv(self.stop_rx) -> _ => break,
                recv(self.done_rx) -> _ => {
                    // Processing ended on its own; nothing left to feed
                    self.producing.store(false, Ordering::Release);
                    return;
                }
            }
        }

        for bytes in self.raw_rx.try_iter() {
            self.buffer.push_bytes(&bytes);
        }
        self.producing.store(false, Ordering::Release);
        debug!(
            received = self.buffer.counters().received(),
            dropped = self.buffer.counters().dropped(),
            "ingest finished"
        );
    }
}

struct ProcessingTask {
    id: String,
    pipeline: EnhancementPipeline,
    windower: Windower,
    output_tx: Sender<Vec<i16>>,
    event_tx: Sender<SessionEvent>,
    state: Arc<Mutex<SessionState>>,
    active: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
    // Dropped on exit so the ingest thread stops waiting
    _done_tx: Sender<()>,
}

impl ProcessingTask {
    fn run(mut self) {
        match self.process() {
            Ok(()) => {
                set_state(&self.state, SessionState::Stopped, &self.id);
                let _ = self.event_tx.send(SessionEvent::Done);
                debug!(session = %self.id, "processing finished");
            }
            Err(err) => {
                error!(session = %self.id, error = %err, "session terminated");
                self.active.store(false, Ordering::Release);
                set_state(&self.state, SessionState::Stopped, &self.id);
                let _ = self.event_tx.send(SessionEvent::Stopped {
                    reason: err.to_string(),
                });
            }
        }
    }

    fn process(&mut self) -> EnhanceResult<()> {
        while let Some(window) = self.windower.next() {
            if window.index() == 0 {
                set_state(&self.state, SessionState::Running, &self.id);
            }

            let output = self.pipeline.process_window(&window)?;
            self.stats.windows_processed.fetch_add(1, Ordering::Relaxed);
            self.stats
                .steering_refreshes
                .store(self.pipeline.steering_refreshes(), Ordering::Relaxed);
            self.emit(output);
        }

        let tail = self.pipeline.finish();
        self.emit(tail);
        Ok(())
    }

    fn emit(&self, block: Vec<i16>) {
        if block.is_empty() {
            return;
        }
        self.stats.samples_emitted.fetch_add(block.len() as u64, Ordering::Relaxed);
        let _ = self.output_tx.send(block);
    }
}

fn set_state(state: &Mutex<SessionState>, next: SessionState, id: &str) {
    let mut current = state.lock();
    if current.can_transition_to(next) {
        debug!(session = %id, from = %*current, to = %next, "state change");
        *current = next;
    } else {
        trace!(session = %id, from = %*current, to = %next, "state change skipped");
    }
}

fn spawn_named<F>(name: String, f: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name).spawn(f)
}

fn default_geometry(channel_count: usize) -> ArrayGeometry {
    let geometry = ArrayGeometry::default();
    if geometry.channel_count() == channel_count {
        geometry
    } else {
        ArrayGeometry::linear(channel_count, DEFAULT_LINEAR_SPACING_M)
    }
}
