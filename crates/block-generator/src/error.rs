//! Error types for the block generation subsystem

use shared_types::{KeyId, StorageError};
use thiserror::Error;

/// Result type alias for block generation operations
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Errors that can occur during block generation and producer banning
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// This node is not a validator (no position in the producer list)
    #[error("Node {key_id} has no producer position: {reason}")]
    NotAValidator {
        /// Our own key id
        key_id: KeyId,
        /// Registry explanation
        reason: String,
    },

    /// Node keys are missing or unusable
    #[error("Node keys unavailable: {0}")]
    MissingKeys(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Slot arithmetic failed (time before genesis, bad position, no producers)
    #[error("Schedule error: {0}")]
    Schedule(String),

    /// Chain storage read/write failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Pending queue access failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Transaction pre-processing or validation collaborator failed
    #[error("Transaction processing error: {0}")]
    Processing(String),

    /// Block could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A candidate block broke a structural invariant
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Bad-block evidence could not be signed or submitted
    #[error("Ban submission failed for producer {producer}: {reason}")]
    BanSubmission {
        /// Offending producer
        producer: KeyId,
        /// Why submission failed
        reason: String,
    },

    /// A host could not be resolved to a producer record
    #[error("Cannot resolve host {host}: {reason}")]
    HostResolution {
        /// Host as given by the caller
        host: String,
        /// Registry explanation
        reason: String,
    },
}

impl GeneratorError {
    /// Configuration problems only lengthen the retry backoff
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NotAValidator { .. }
                | Self::MissingKeys(_)
                | Self::InvalidConfig(_)
                | Self::Schedule(_)
        )
    }

    /// Check if error is recoverable (the attempt is retried next tick)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Queue(_) | Self::Processing(_) | Self::Serialization(_)
        ) || self.is_configuration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_validator = GeneratorError::NotAValidator {
            key_id: 7,
            reason: "unknown key".into(),
        };
        assert!(not_validator.is_configuration());
        assert!(not_validator.is_recoverable());

        let storage = GeneratorError::Storage(StorageError::DatabaseError("io".into()));
        assert!(!storage.is_configuration());
        assert!(storage.is_recoverable());
    }

    #[test]
    fn test_host_resolution_is_not_recoverable() {
        let err = GeneratorError::HostResolution {
            host: "10.0.0.9:7078".into(),
            reason: "unknown".into(),
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("10.0.0.9:7078"));
    }
}
