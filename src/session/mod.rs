// src/session/mod.rs
//! Session lifecycle, control commands and the session registry

pub mod command;
pub mod controller;
pub mod registry;
pub mod state;

pub use command::{ControlCommand, SessionEvent, UnknownCommand};
pub use controller::{Session, SessionStats, SessionStatsSnapshot};
pub use registry::{EstimatorFactory, SessionRegistry};
pub use state::SessionState;
