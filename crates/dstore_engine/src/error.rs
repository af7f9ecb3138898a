//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while talking to a key-value engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A watched key changed between `watch` and `exec`; nothing was applied.
    #[error("transaction aborted: a watched key was modified")]
    TransactionAborted,

    /// The connection to the engine failed.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// The engine reported a transient server-side failure.
    #[error("server error: {message}")]
    Server {
        /// Description of the failure.
        message: String,
    },

    /// An operation targeted a key holding a different data type.
    #[error("wrong type for key {key}: expected {expected}")]
    WrongType {
        /// The offending key.
        key: String,
        /// The data type the operation expected.
        expected: &'static str,
    },

    /// An argument was rejected before reaching the keyspace.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },
}

impl EngineError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a transient server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Creates a wrong-type error.
    pub fn wrong_type(key: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            key: key.into(),
            expected,
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true if re-running the whole unit of work may succeed.
    ///
    /// Aborted transactions, connection hiccups and transient server errors
    /// are retryable. Type errors and rejected arguments are wiring bugs.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransactionAborted | Self::Connection { .. } | Self::Server { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(EngineError::TransactionAborted.is_retryable());
        assert!(EngineError::connection("reset by peer").is_retryable());
        assert!(EngineError::server("LOADING").is_retryable());
        assert!(!EngineError::wrong_type("k", "set").is_retryable());
        assert!(!EngineError::invalid_argument("empty key").is_retryable());
    }

    #[test]
    fn error_display() {
        let err = EngineError::wrong_type("store:doc:product", "hash");
        assert_eq!(
            err.to_string(),
            "wrong type for key store:doc:product: expected hash"
        );
    }
}
