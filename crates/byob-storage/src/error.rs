//! Storage error types for byob-storage.
//!
//! [`StorageError`] covers the failure modes of reading and writing
//! definition records and library bundles: serialization, file access and
//! integrity violations.

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a bundle file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record's spec and declarations do not correspond.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },

    /// A bundle's content does not match its checksum.
    #[error("checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: String, found: String },
}
