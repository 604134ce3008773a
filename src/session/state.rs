// src/session/state.rs
//! Session lifecycle states

use std::fmt;

/// Lifecycle of one enhancement session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Constructed, never started
    Idle,
    /// Tasks spawned, no window processed yet
    Started,
    /// Steady-state processing
    Running,
    /// Input closed; draining the queue and flushing the remainder
    Stopping,
    /// Tasks finished; a new start builds fresh state
    Stopped,
}

impl SessionState {
    /// True while tasks are alive
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Started | SessionState::Running | SessionState::Stopping)
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Started)
                | (Stopped, Started)
                | (Started, Running)
                | (Started, Stopping)
                | (Running, Stopping)
                | (Started, Stopped)
                | (Running, Stopped)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Started => "started",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
