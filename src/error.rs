// src/error.rs
//! Unified error handling for the enhancement core
//!
//! Every fallible operation in the crate returns [`EnhanceResult`]. Errors carry an
//! [`ErrorContext`] naming the component and operation that failed, so a session
//! that terminates early can report exactly which stage gave up.
//!
//! Most data problems never become errors at all: misaligned blocks are padded,
//! short blocks are dropped and counted, and PSD ratios with a zero denominator
//! resolve to zero. What remains here is the small set of conditions that abort a
//! session or a construction.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::time::SystemTime;
use thiserror::Error;

/// Unified error type for the enhancement core
#[derive(Debug, Error)]
pub enum EnhanceError {
    /// Invalid or inconsistent configuration; fatal at construction
    #[error("[CONFIG] Configuration error in {component}: {reason} ({})", .context.operation)]
    Configuration {
        component: String,
        reason: String,
        context: ErrorContext,
    },

    /// Input data that cannot be used even after local recovery
    #[error("[DATA] Invalid {data_type}: {reason} ({})", .context.operation)]
    InvalidData {
        data_type: String,
        reason: String,
        context: ErrorContext,
    },

    /// Overlap-add reconstruction received a window it cannot place
    #[error("[RECONSTRUCTION] expected window of {expected} samples, got {actual} ({})", .context.operation)]
    Reconstruction {
        expected: usize,
        actual: usize,
        context: ErrorContext,
    },

    /// The steering-vector estimator failed or returned unusable data
    #[error("[COLLABORATOR] steering estimator failed: {reason} ({})", .context.operation)]
    Collaborator {
        reason: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },

    /// Session lifecycle errors (thread spawn, unknown identifier)
    #[error("[SESSION] {reason} ({})", .context.operation)]
    Session {
        reason: String,
        context: ErrorContext,
    },

    /// Filesystem errors while loading profiles or configuration
    #[error("[IO] {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

/// Error context for debugging and analysis
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: SystemTime,
    pub thread_name: Option<String>,
    pub component: String,
    pub operation: String,
    pub file: Option<&'static str>,
    pub line: Option<u32>,
    pub additional_info: HashMap<String, String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            timestamp: SystemTime::now(),
            thread_name: std::thread::current().name().map(|s| s.to_string()),
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
            additional_info: HashMap::new(),
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &'static str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file);
        context.line = Some(line);
        context
    }

    /// Add additional information to the context
    pub fn add_info<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

/// Result type alias for enhancement operations
pub type EnhanceResult<T> = Result<T, EnhanceError>;

impl EnhanceError {
    pub fn configuration(component: &str, reason: impl Into<String>) -> Self {
        EnhanceError::Configuration {
            component: component.to_string(),
            reason: reason.into(),
            context: ErrorContext::new(component, "configure"),
        }
    }

    pub fn collaborator(operation: &str, reason: impl Into<String>) -> Self {
        EnhanceError::Collaborator {
            reason: reason.into(),
            source: None,
            context: ErrorContext::new("steering", operation),
        }
    }

    pub fn session(operation: &str, reason: impl Into<String>) -> Self {
        EnhanceError::Session {
            reason: reason.into(),
            context: ErrorContext::new("session", operation),
        }
    }

    /// True for errors that must terminate a running session
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            EnhanceError::Collaborator { .. } | EnhanceError::Configuration { .. }
        )
    }

    /// Context attached to this error, if any
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            EnhanceError::Configuration { context, .. }
            | EnhanceError::InvalidData { context, .. }
            | EnhanceError::Reconstruction { context, .. }
            | EnhanceError::Collaborator { context, .. }
            | EnhanceError::Session { context, .. } => Some(context),
            EnhanceError::Io { .. } => None,
        }
    }
}

impl From<crate::config::ConfigError> for EnhanceError {
    fn from(err: crate::config::ConfigError) -> Self {
        EnhanceError::Configuration {
            component: "config".to_string(),
            reason: err.to_string(),
            context: error_context!("config", "load"),
        }
    }
}

impl From<crate::steering::SteeringError> for EnhanceError {
    fn from(err: crate::steering::SteeringError) -> Self {
        EnhanceError::Collaborator {
            reason: err.to_string(),
            source: Some(Box::new(err)),
            context: error_context!("steering", "estimate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("combiner", "combine");
        assert_eq!(context.component, "combiner");
        assert_eq!(context.operation, "combine");
        assert!(context.timestamp <= SystemTime::now());
    }

    #[test]
    fn test_error_context_macro_records_location() {
        let context = error_context!("windower", "next_window").add_info("rows", "12");
        assert_eq!(context.file, Some(file!()));
        assert!(context.line.is_some());
        assert_eq!(context.additional_info.get("rows").map(String::as_str), Some("12"));
    }

    #[test]
    fn test_error_display() {
        let err = EnhanceError::Reconstruction {
            expected: 4096,
            actual: 2048,
            context: ErrorContext::new("overlap_buffer", "append"),
        };

        let display = err.to_string();
        assert!(display.contains("4096"));
        assert!(display.contains("2048"));
        assert!(display.contains("append"));
    }

    #[test]
    fn test_session_fatal_classification() {
        assert!(EnhanceError::collaborator("estimate", "no source").is_session_fatal());
        assert!(!EnhanceError::session("start", "already running").is_session_fatal());
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EnhanceError>();
    }
}
