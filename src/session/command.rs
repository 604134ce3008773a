// src/session/command.rs
//! Control commands and lifecycle events

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Start or stop a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown control command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for ControlCommand {
    type Err = UnknownCommand;

    /// Accepts the transport's `ListeningStarted` / `ListeningDone` and plain
    /// `start` / `stop`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ListeningStarted" | "start" | "Start" => Ok(ControlCommand::Start),
            "ListeningDone" | "stop" | "Stop" => Ok(ControlCommand::Stop),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Events published by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    /// Normal end: input drained and every sample emitted
    Done,
    /// Early end after a fatal error
    Stopped { reason: String },
}

impl SessionEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Started => "BeamformingStarted",
            SessionEvent::Done => "BeamformingDone",
            SessionEvent::Stopped { .. } => "BeamformingStopped",
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Stopped { reason } => write!(f, "{}: {}", self.name(), reason),
            _ => f.write_str(self.name()),
        }
    }
}
