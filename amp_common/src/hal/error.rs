//! HAL error type.
//!
//! Every variant is environment-fatal: the caller logs it and terminates.
//! Invariant violations (unknown line, bad bounds) are panics, not errors.

use crate::config::ConfigError;
use thiserror::Error;

/// Error types for input-layer operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HalError {
    /// A GPIO chip or line could not be opened for edge monitoring.
    #[error("Failed to open line: {0}")]
    LineOpen(String),

    /// Waiting for an edge failed.
    #[error("Edge wait failed: {0}")]
    Wait(String),

    /// Reading a kernel edge event failed.
    #[error("Edge event read failed: {0}")]
    EventRead(String),

    /// A peripheral thread could not be created.
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    /// A peripheral thread panicked before it was joined.
    #[error("Thread panicked: {0}")]
    ThreadPanicked(String),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Shared memory error.
    #[error("Shared memory error: {0}")]
    SharedMemory(String),

    /// A status document could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Result alias for input-layer operations.
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_is_not_reported_as_event_read() {
        let err = HalError::Serialization("key must be a string".into());
        assert_eq!(err.to_string(), "Serialization failed: key must be a string");
        assert_ne!(err, HalError::EventRead("key must be a string".into()));
    }
}
