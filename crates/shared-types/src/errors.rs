//! # Error Types
//!
//! Error types shared by the generator and the storage adapters.

use thiserror::Error;

/// Errors reported by chain storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Block not found in storage.
    #[error("Block not found: {0}")]
    NotFound(String),

    /// Inserted block does not extend the current head.
    #[error("Non-sequential block: expected {expected}, got {actual}")]
    NonSequential { expected: i64, actual: i64 },

    /// Block payload could not be decoded or encoded.
    #[error("Block codec error: {0}")]
    Codec(#[from] CodecError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Errors from the block envelope codec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Deserialization failed.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Envelope does not carry the block type prefix.
    #[error("unexpected envelope type {0}")]
    UnexpectedType(u8),
}
