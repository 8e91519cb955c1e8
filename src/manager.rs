//! Multi-layer cache manager
//!
//! `StrataCache` owns the layer stack and orchestrates admission, lookup,
//! promotion, and optimization. All collaborators (codec, encryption engine,
//! layers) are built from the injected configuration; nothing here is global
//! state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

use crate::codec::Codec;
use crate::config::{CacheConfig, Priority};
use crate::crypto::EncryptionEngine;
use crate::entry::{CacheEntry, Encoding};
use crate::error::{Error, Result};
use crate::layer::CacheLayer;
use crate::stats::CacheStatsReport;

// =============================================================================
// Set Options
// =============================================================================

/// Per-call options for [`StrataCache::set`]
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Pin the entry to a named layer, bypassing admission routing
    pub layer: Option<String>,
    /// Content type hint; sensitive types are always encrypted on
    /// encrypting layers
    pub content_type: Option<String>,
    /// Routing priority when no explicit layer is given
    pub priority: Priority,
}

impl SetOptions {
    /// Pin to a named layer
    pub fn in_layer(name: impl Into<String>) -> Self {
        Self {
            layer: Some(name.into()),
            ..Default::default()
        }
    }

    /// Use a routing priority
    pub fn with_priority(priority: Priority) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }

    /// Attach a content type hint
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

// =============================================================================
// Optimize Report
// =============================================================================

/// A capacity adjustment made by an optimize pass
#[derive(Debug, Clone, serde::Serialize)]
pub struct CapacityChange {
    pub layer: String,
    pub from_bytes: u64,
    pub to_bytes: u64,
}

/// Outcome of an [`StrataCache::optimize`] pass
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OptimizeReport {
    /// Entries dropped because they were past their layer's max age
    pub expired: u64,
    /// Entries evicted to bring layers back under capacity
    pub evicted: u64,
    /// Capacity adjustments applied by adaptive rescaling
    pub rescaled: Vec<CapacityChange>,
}

// =============================================================================
// Cache Manager
// =============================================================================

/// Multi-layer in-process cache.
///
/// Layers are probed in configuration order; entries promote one layer up as
/// they get hot and age out per layer policy. See [`crate::config`] for the
/// tuning surface.
pub struct StrataCache {
    config: CacheConfig,
    layers: Vec<CacheLayer>,
    codec: Codec,
    crypto: EncryptionEngine,
}

impl StrataCache {
    /// Build a cache from a validated configuration
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let layers = config.layers.iter().map(CacheLayer::new).collect();
        let codec = Codec::new(config.compression.clone());
        let crypto = EncryptionEngine::new(config.encryption.clone());

        info!(
            layers = config.layers.len(),
            "initialized multi-layer cache"
        );

        Ok(Self {
            config,
            layers,
            codec,
            crypto,
        })
    }

    /// Build a cache with the default three-layer topology
    pub fn with_defaults() -> Result<Self> {
        Self::new(CacheConfig::default())
    }

    /// The active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Layer names in probe order
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    // =========================================================================
    // Set
    // =========================================================================

    /// Store a value and return the name of the layer it landed in.
    ///
    /// The entry is serialized, then compressed and/or encrypted according to
    /// the target layer's flags. An explicit layer in `options` overrides
    /// admission routing; an unknown name is an error.
    #[instrument(skip(self, value, options), fields(key = %key))]
    pub fn set<T: Serialize>(&self, key: &str, value: &T, options: SetOptions) -> Result<String> {
        let serialized = self.codec.serialize(key, value)?;
        let logical_size = serialized.len() as u64;

        let index = match &options.layer {
            Some(name) => self
                .config
                .layer_index(name)
                .ok_or_else(|| Error::UnknownLayer { name: name.clone() })?,
            None => self
                .config
                .admission
                .target_index(self.layers.len(), logical_size, options.priority),
        };
        let layer = &self.layers[index];

        let entry = self.encode(&serialized, logical_size, layer, &options)?;
        layer.insert(key, entry)?;

        debug!(
            layer = layer.name(),
            logical_size, "stored entry"
        );
        Ok(layer.name().to_string())
    }

    /// Apply the target layer's encoding transforms to a serialized payload
    fn encode(
        &self,
        serialized: &[u8],
        logical_size: u64,
        layer: &CacheLayer,
        options: &SetOptions,
    ) -> Result<CacheEntry> {
        let (mut payload, compression) = if layer.compress() {
            self.codec.maybe_compress(serialized)?
        } else {
            (
                bytes::Bytes::copy_from_slice(serialized),
                crate::codec::CompressionAlgorithm::None,
            )
        };

        let sensitive = options
            .content_type
            .as_deref()
            .map(|ct| self.config.admission.is_sensitive(ct))
            .unwrap_or(false);

        let encrypted = layer.encrypt() && self.crypto.should_encrypt(logical_size, sensitive);
        if encrypted {
            payload = self.crypto.seal(&payload)?;
        }

        Ok(CacheEntry::new(
            payload,
            logical_size,
            Encoding {
                compression,
                encrypted,
                content_type: options.content_type.clone(),
            },
        ))
    }

    // =========================================================================
    // Get
    // =========================================================================

    /// Look up a value, probing layers in configuration order.
    ///
    /// `Ok(None)` is a miss. `Err` means a stored entry could not be decoded
    /// (corruption, failed decryption); the offending entry is dropped so the
    /// next lookup is a clean miss. Hot entries are promoted one layer up as
    /// a side effect.
    #[instrument(skip(self), fields(key = %key))]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        for index in 0..self.layers.len() {
            let layer = &self.layers[index];
            let Some(entry) = layer.get(key) else {
                continue;
            };

            let value = match self.decode(key, &entry) {
                Ok(value) => value,
                Err(e) => {
                    warn!(layer = layer.name(), error = %e, "dropping undecodable entry");
                    layer.remove(key);
                    return Err(e);
                }
            };

            if index > 0
                && self
                    .config
                    .promotion
                    .should_promote(entry.metadata.access_count())
            {
                self.promote(key, index);
            }

            trace!(layer = layer.name(), "cache hit");
            return Ok(Some(value));
        }

        trace!("cache miss");
        Ok(None)
    }

    /// Reverse an entry's encoding transforms and deserialize it
    fn decode<T: DeserializeOwned>(&self, key: &str, entry: &CacheEntry) -> Result<T> {
        if !entry.verify_integrity() {
            return Err(Error::IntegrityMismatch {
                key: key.to_string(),
            });
        }

        let payload = if entry.encoding.encrypted {
            self.crypto.open(entry.payload())?
        } else {
            entry.payload().clone()
        };

        let payload = self.codec.decompress(&payload, entry.encoding.compression)?;
        self.codec.deserialize(key, &payload)
    }

    /// Move an entry one layer up. Best effort: if the upper layer rejects
    /// it the entry goes back where it was.
    fn promote(&self, key: &str, from: usize) {
        let source = &self.layers[from];
        let target = &self.layers[from - 1];

        let Some(entry) = source.take_for_promotion(key) else {
            return;
        };

        if let Err(e) = target.insert_promoted(key, entry.clone()) {
            warn!(
                from = source.name(),
                to = target.name(),
                error = %e,
                "promotion rejected, restoring entry"
            );
            let _ = source.insert(key, entry);
            return;
        }

        debug!(from = source.name(), to = target.name(), key, "promoted entry");
    }

    // =========================================================================
    // Delete / Clear
    // =========================================================================

    /// Remove a key from every layer. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        let mut found = false;
        for layer in &self.layers {
            if layer.remove(key).is_some() {
                found = true;
            }
        }
        found
    }

    /// Drop all entries and reset every layer's statistics
    pub fn clear(&self) {
        for layer in &self.layers {
            layer.clear();
        }
        info!("cache cleared");
    }

    /// Check for a key in any layer without touching stats or access order
    pub fn contains(&self, key: &str) -> bool {
        self.layers.iter().any(|l| l.contains(key))
    }

    // =========================================================================
    // Stats / Optimize
    // =========================================================================

    /// Snapshot statistics for every layer
    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport::from_layers(self.layers.iter().map(|l| l.snapshot()).collect())
    }

    /// Run a full maintenance pass: sweep expired entries, re-evict
    /// over-full layers, and apply adaptive capacity rescaling.
    ///
    /// The background task drives the two passes on separate intervals;
    /// this entry point runs both immediately.
    pub fn optimize(&self) -> OptimizeReport {
        let (expired, evicted) = self.sweep_layers();
        let rescaled = self.rescale_layers();

        let report = OptimizeReport {
            expired,
            evicted,
            rescaled,
        };
        if report.expired > 0 || report.evicted > 0 || !report.rescaled.is_empty() {
            info!(
                expired = report.expired,
                evicted = report.evicted,
                rescaled = report.rescaled.len(),
                "optimize pass complete"
            );
        }
        report
    }

    /// Drop expired entries in every layer and re-evict any layer still
    /// over capacity. Returns (expired, evicted) totals.
    pub(crate) fn sweep_layers(&self) -> (u64, u64) {
        let mut expired = 0;
        let mut evicted = 0;
        for layer in &self.layers {
            let (e, v) = layer.sweep();
            expired += e;
            evicted += v;
        }
        (expired, evicted)
    }

    /// Adjust layer capacities toward observed hit rates.
    ///
    /// A layer with enough samples grows by one step when its hit rate is
    /// high and overall cache utilization leaves headroom, and shrinks by
    /// one step when its hit rate is low. Growth respects the global
    /// capacity ceiling; shrinking respects the per-layer floor.
    pub(crate) fn rescale_layers(&self) -> Vec<CapacityChange> {
        let policy = &self.config.scaling;
        let mut changes = Vec::new();
        let mut total: u64 = self.layers.iter().map(|l| l.capacity()).sum();

        // Growth is gated on utilization of the cache as a whole, not the
        // candidate layer: a hot layer running full is exactly the one that
        // should grow while the cache still has room overall.
        let total_resident: u64 = self.layers.iter().map(|l| l.resident_bytes()).sum();
        let utilization = if total == 0 {
            0.0
        } else {
            total_resident as f64 / total as f64
        };

        for layer in &self.layers {
            let stats = layer.stats();
            if stats.samples() < policy.min_samples {
                continue;
            }

            let capacity = layer.capacity();
            let hit_rate = stats.hit_rate();

            let step = (capacity as f64 * policy.step) as u64;
            if step == 0 {
                continue;
            }

            let target = if hit_rate > policy.grow_hit_rate && utilization < policy.max_utilization
            {
                let headroom = policy.max_total_bytes.saturating_sub(total);
                capacity + step.min(headroom)
            } else if hit_rate < policy.shrink_hit_rate {
                capacity.saturating_sub(step).max(policy.min_layer_bytes)
            } else {
                capacity
            };

            if target != capacity {
                layer.set_capacity(target);
                total = total - capacity + target;
                debug!(
                    layer = layer.name(),
                    from = capacity,
                    to = target,
                    hit_rate,
                    "rescaled layer capacity"
                );
                changes.push(CapacityChange {
                    layer: layer.name().to_string(),
                    from_bytes: capacity,
                    to_bytes: target,
                });
            }
        }

        changes
    }

    /// Direct access to a layer by name (for introspection and tests)
    pub(crate) fn layer(&self, name: &str) -> Option<&CacheLayer> {
        self.layers.iter().find(|l| l.name() == name)
    }
}

impl std::fmt::Debug for StrataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrataCache")
            .field("layers", &self.layer_names())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
