//! Cache entry types
//!
//! An entry owns its encoded payload plus the access bookkeeping used by
//! eviction and promotion. Access fields are atomics so reads never take a
//! write lock on the owning layer.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::codec::CompressionAlgorithm;

/// How a stored payload was encoded on admission.
///
/// Flags travel with the entry across promotions so decoding never depends
/// on the configuration of the layer currently holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// Compression applied to the serialized payload
    pub compression: CompressionAlgorithm,
    /// Whether the payload is AES-GCM sealed
    pub encrypted: bool,
    /// Caller-supplied content type, if any
    pub content_type: Option<String>,
}

impl Encoding {
    /// Plain serialized payload, no transforms
    pub fn plain() -> Self {
        Self {
            compression: CompressionAlgorithm::None,
            encrypted: false,
            content_type: None,
        }
    }
}

/// Access bookkeeping for a cache entry
#[derive(Debug)]
pub struct EntryMetadata {
    /// Serialized payload size before compression/encryption
    logical_size: u64,
    /// Resident payload size (what counts against layer capacity)
    stored_size: u64,
    /// Creation instant
    created_at: Instant,
    /// Last access, in milliseconds since creation
    last_access_ms: AtomicU64,
    /// Access count for frequency-based eviction and promotion
    access_count: AtomicU32,
    /// Content hash over the encoded payload (for integrity)
    content_hash: u64,
}

impl EntryMetadata {
    fn new(logical_size: u64, stored_size: u64, content_hash: u64) -> Self {
        Self {
            logical_size,
            stored_size,
            created_at: Instant::now(),
            last_access_ms: AtomicU64::new(0),
            access_count: AtomicU32::new(1),
            content_hash,
        }
    }

    /// Serialized size before encoding
    #[inline]
    pub fn logical_size(&self) -> u64 {
        self.logical_size
    }

    /// Resident size in the owning layer
    #[inline]
    pub fn stored_size(&self) -> u64 {
        self.stored_size
    }

    /// Time since the entry was created
    #[inline]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the entry was last accessed
    #[inline]
    pub fn idle(&self) -> Duration {
        let last = Duration::from_millis(self.last_access_ms.load(Ordering::Relaxed));
        self.age().saturating_sub(last)
    }

    /// Record an access and return the new count
    #[inline]
    pub fn record_access(&self) -> u32 {
        let since_created = self.created_at.elapsed().as_millis() as u64;
        self.last_access_ms.store(since_created, Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get access count
    #[inline]
    pub fn access_count(&self) -> u32 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// Get content hash
    #[inline]
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }
}

impl Clone for EntryMetadata {
    fn clone(&self) -> Self {
        Self {
            logical_size: self.logical_size,
            stored_size: self.stored_size,
            created_at: self.created_at,
            last_access_ms: AtomicU64::new(self.last_access_ms.load(Ordering::Relaxed)),
            access_count: AtomicU32::new(self.access_count.load(Ordering::Relaxed)),
            content_hash: self.content_hash,
        }
    }
}

/// A cache entry: encoded payload plus metadata
#[derive(Clone)]
pub struct CacheEntry {
    /// Access bookkeeping
    pub metadata: EntryMetadata,
    /// Encoding flags
    pub encoding: Encoding,
    /// Encoded payload (zero-copy handle)
    payload: Bytes,
}

impl CacheEntry {
    /// Create an entry from an encoded payload
    pub fn new(payload: Bytes, logical_size: u64, encoding: Encoding) -> Self {
        let content_hash = fx_hash(&payload);
        let stored_size = payload.len() as u64;
        Self {
            metadata: EntryMetadata::new(logical_size, stored_size, content_hash),
            encoding,
            payload,
        }
    }

    /// Get the encoded payload
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Resident size in bytes
    #[inline]
    pub fn stored_size(&self) -> u64 {
        self.metadata.stored_size()
    }

    /// Record an access and return the new count
    #[inline]
    pub fn record_access(&self) -> u32 {
        self.metadata.record_access()
    }

    /// Verify the payload against its stored content hash
    pub fn verify_integrity(&self) -> bool {
        fx_hash(&self.payload) == self.metadata.content_hash()
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("stored_size", &self.metadata.stored_size())
            .field("logical_size", &self.metadata.logical_size())
            .field("access_count", &self.metadata.access_count())
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Fast non-cryptographic hash (FxHash algorithm)
#[inline]
pub(crate) fn fx_hash(bytes: &[u8]) -> u64 {
    const SEED: u64 = 0x517cc1b727220a95;
    let mut hash = SEED;
    for &byte in bytes {
        hash = hash.rotate_left(5) ^ (byte as u64);
        hash = hash.wrapping_mul(SEED);
    }
    hash
}

// =============================================================================
// Tests
// =============================================================================
