//! Payload encryption
//!
//! AES-256-GCM sealing for large or sensitive payloads on encrypting layers.
//! The key is generated once per cache instance and never leaves the
//! process; the cache holds no durable state, so sealed payloads share its
//! lifetime by design.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// AES-GCM nonce length in bytes (96 bits)
const NONCE_LEN: usize = 12;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for payload encryption
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Minimum serialized size to encrypt on encrypting layers.
    /// Sensitive content types are sealed regardless of size.
    pub min_size_bytes: u64,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: 1024 * 1024, // 1MB
        }
    }
}

// =============================================================================
// Encryption Engine
// =============================================================================

/// Seals and opens payloads with a per-instance AES-256-GCM key.
///
/// The sealed form is `nonce || ciphertext`; each seal draws a fresh random
/// nonce.
pub struct EncryptionEngine {
    config: EncryptionConfig,
    cipher: Aes256Gcm,
}

impl EncryptionEngine {
    /// Create an engine with a freshly generated key
    pub fn new(config: EncryptionConfig) -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            config,
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &EncryptionConfig {
        &self.config
    }

    /// Whether a payload qualifies for encryption on an encrypting layer
    pub fn should_encrypt(&self, logical_size: u64, sensitive: bool) -> bool {
        sensitive || logical_size >= self.config.min_size_bytes
    }

    /// Seal a payload
    pub fn seal(&self, plaintext: &[u8]) -> Result<Bytes> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(Bytes::from(sealed))
    }

    /// Open a sealed payload
    pub fn open(&self, sealed: &[u8]) -> Result<Bytes> {
        if sealed.len() < NONCE_LEN {
            return Err(Error::DecryptionFailed(
                "sealed payload shorter than nonce".into(),
            ));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| Error::DecryptionFailed(e.to_string()))?;
        Ok(Bytes::from(plaintext))
    }
}

impl std::fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionEngine")
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
