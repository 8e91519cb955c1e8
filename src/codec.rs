//! Payload serialization and compression
//!
//! LZ4 compression with automatic fallback: payloads below the size
//! threshold, or that fail to shrink, are stored uncompressed.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CompressionAlgorithm {
    /// No compression
    None,
    /// LZ4 - fast compression
    #[default]
    Lz4,
}

impl CompressionAlgorithm {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Compression Configuration
// =============================================================================

/// Configuration for compression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Default algorithm to use
    pub default_algorithm: CompressionAlgorithm,
    /// Minimum serialized size to compress (smaller payloads stay raw)
    pub min_size_bytes: u64,
    /// Compression level (LZ4 high-compression mode, 1-12)
    pub level: i32,
    /// Whether to fall back to uncompressed on failure
    pub fallback_on_failure: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            default_algorithm: CompressionAlgorithm::Lz4,
            min_size_bytes: 10 * 1024, // 10KB
            level: 3,
            fallback_on_failure: true,
        }
    }
}

impl CompressionConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.level) {
            return Err(Error::Config(
                "compression level must be between 1 and 12".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Get the algorithm identifier
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through compressor (no compression)
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// LZ4 compressor
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    /// Create with a compression level (1-12)
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Serialization + compression pipeline shared by all layers.
pub struct Codec {
    config: CompressionConfig,
    noop: NoopCompressor,
    lz4: Lz4Compressor,
}

impl Codec {
    /// Create a codec from compression settings
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            lz4: Lz4Compressor::with_level(config.level),
            noop: NoopCompressor,
            config,
        }
    }

    fn compressor(&self, algorithm: CompressionAlgorithm) -> &dyn Compressor {
        match algorithm {
            CompressionAlgorithm::None => &self.noop,
            CompressionAlgorithm::Lz4 => &self.lz4,
        }
    }

    /// Serialize a payload to its canonical byte form
    pub fn serialize<T: Serialize>(&self, key: &str, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Serialization {
            key: key.to_string(),
            source: e,
        })
    }

    /// Deserialize a payload from its canonical byte form
    pub fn deserialize<T: DeserializeOwned>(&self, key: &str, data: &[u8]) -> Result<T> {
        serde_json::from_slice(data).map_err(|e| Error::Deserialization {
            key: key.to_string(),
            source: e,
        })
    }

    /// Compress serialized data if it is large enough to benefit.
    ///
    /// Returns the (possibly untouched) bytes and the algorithm actually
    /// applied. Compressed output is kept only when it is smaller than the
    /// input.
    pub fn maybe_compress(&self, data: &[u8]) -> Result<(Bytes, CompressionAlgorithm)> {
        if (data.len() as u64) < self.config.min_size_bytes {
            return Ok((Bytes::copy_from_slice(data), CompressionAlgorithm::None));
        }

        let compressor = self.compressor(self.config.default_algorithm);
        match compressor.compress(data) {
            Ok(compressed) if compressed.len() < data.len() => {
                Ok((Bytes::from(compressed), self.config.default_algorithm))
            }
            Ok(_) => Ok((Bytes::copy_from_slice(data), CompressionAlgorithm::None)),
            Err(e) if self.config.fallback_on_failure => {
                tracing::warn!("Compression failed, storing uncompressed: {}", e);
                Ok((Bytes::copy_from_slice(data), CompressionAlgorithm::None))
            }
            Err(e) => Err(e),
        }
    }

    /// Reverse a compression transform
    pub fn decompress(&self, data: &[u8], algorithm: CompressionAlgorithm) -> Result<Bytes> {
        let decompressed = self.compressor(algorithm).decompress(data)?;
        Ok(Bytes::from(decompressed))
    }

    /// Get configuration
    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
