//! Error types for dstore core.

use dstore_engine::EngineError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in dstore core operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Key-value engine error.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Serialization error.
    #[error("codec error: {0}")]
    Codec(#[from] dstore_codec::CodecError),

    /// Entity input was given without a projection to turn it into index values.
    #[error("a value projection is required for {target}")]
    MissingProjection {
        /// What needed projecting.
        target: String,
    },

    /// A key component was empty or malformed.
    #[error("invalid key component {component}: {reason}")]
    InvalidKey {
        /// Which component was rejected.
        component: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// An index declared one shape but produced state for another.
    #[error("index {index} is declared as {declared} but produced {produced} state")]
    ShapeMismatch {
        /// Index name.
        index: String,
        /// The declared shape.
        declared: &'static str,
        /// The kind of state actually produced.
        produced: &'static str,
    },

    /// A single-valued slot received several values.
    #[error("{slot} accepts a single value, got {count}")]
    TooManyValues {
        /// Index or reference name.
        slot: String,
        /// Number of values received.
        count: usize,
    },

    /// The retry policy gave up on a conflicting resource.
    #[error("reconciliation of {resource} aborted after {attempts} attempts")]
    ReconciliationAborted {
        /// Sentinel key of the contended resource.
        resource: String,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of the error.
        message: String,
    },
}

impl CoreError {
    /// Creates a missing projection error.
    pub fn missing_projection(target: impl Into<String>) -> Self {
        Self::MissingProjection {
            target: target.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(component: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            component,
            reason: reason.into(),
        }
    }

    /// Creates a too-many-values error.
    pub fn too_many_values(slot: impl Into<String>, count: usize) -> Self {
        Self::TooManyValues {
            slot: slot.into(),
            count,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if re-running the reconciliation unit may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Engine(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_engine_transients_retry() {
        assert!(CoreError::from(EngineError::TransactionAborted).is_retryable());
        assert!(!CoreError::from(EngineError::wrong_type("k", "set")).is_retryable());
        assert!(!CoreError::missing_projection("brand").is_retryable());
        assert!(!CoreError::too_many_values("by_slug", 2).is_retryable());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            CoreError::too_many_values("by_slug", 3).to_string(),
            "by_slug accepts a single value, got 3"
        );
        assert_eq!(
            CoreError::invalid_key("doc type", "must not be empty").to_string(),
            "invalid key component doc type: must not be empty"
        );
    }
}
