// src/session/registry.rs
//! Sessions keyed by identifier

use super::command::ControlCommand;
use super::controller::Session;
use crate::config::SessionConfig;
use crate::error::EnhanceResult;
use crate::steering::SteeringEstimator;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the steering estimator for a new session
pub type EstimatorFactory = Arc<dyn Fn() -> Arc<dyn SteeringEstimator> + Send + Sync>;

/// Independent sessions sharing one configuration template.
///
/// Each session gets its own estimator from the factory and its own state; the
/// registry only maps identifiers to sessions.
pub struct SessionRegistry {
    config: SessionConfig,
    estimator_factory: EstimatorFactory,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig, estimator_factory: EstimatorFactory) -> EnhanceResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            estimator_factory,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Existing session for `id`, or a new idle one
    pub fn get_or_create(&self, id: &str) -> EnhanceResult<Arc<Session>> {
        if let Some(session) = self.sessions.read().get(id) {
            return Ok(session.clone());
        }

        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get(id) {
            return Ok(session.clone());
        }
        let session = Arc::new(Session::new(id, self.config.clone(), (self.estimator_factory)())?);
        sessions.insert(id.to_string(), session.clone());
        info!(session = %id, "session registered");
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn start(&self, id: &str) -> EnhanceResult<bool> {
        self.get_or_create(id)?.start()
    }

    /// Stop `id`; unknown identifiers are a logged no-op
    pub fn stop(&self, id: &str) -> bool {
        match self.get(id) {
            Some(session) => session.stop(),
            None => {
                warn!(session = %id, "stop ignored: unknown session");
                false
            }
        }
    }

    pub fn handle(&self, id: &str, command: ControlCommand) -> EnhanceResult<bool> {
        match command {
            ControlCommand::Start => self.start(id),
            ControlCommand::Stop => Ok(self.stop(id)),
        }
    }

    /// Route a raw block to `id`; `false` when unknown or not running
    pub fn push(&self, id: &str, bytes: &[u8]) -> bool {
        self.get(id).map(|session| session.push(bytes)).unwrap_or(false)
    }

    /// Stop and forget `id`
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.write().remove(id)?;
        if session.is_active() {
            session.stop();
        }
        Some(session)
    }

    pub fn stop_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.read().values().cloned().collect();
        for session in sessions {
            if session.is_active() {
                session.stop();
            }
        }
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
