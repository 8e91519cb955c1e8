//! Error types for stratacache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the cache
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced layer does not exist
    #[error("Unknown cache layer: {name}")]
    UnknownLayer { name: String },

    /// Entry cannot fit in its target layer even after full eviction
    #[error("Entry '{key}' ({size} bytes) exceeds capacity of layer '{layer}' ({capacity} bytes)")]
    EntryTooLarge {
        key: String,
        size: u64,
        layer: String,
        capacity: u64,
    },

    /// Payload serialization failed
    #[error("Serialization failed for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Payload deserialization failed
    #[error("Deserialization failed for key '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Stored payload failed its integrity check
    #[error("Integrity check failed for key '{key}'")]
    IntegrityMismatch { key: String },
}
