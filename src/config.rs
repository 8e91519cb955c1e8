//! Cache configuration
//!
//! Layer topology and tuning knobs. Everything here is plain data with
//! `Default` impls and a `validate()` entry point; the admission and scaling
//! thresholds are deployment policy, not contract.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::CompressionConfig;
use crate::crypto::EncryptionConfig;
use crate::error::{Error, Result};
use crate::policy::{EvictionStrategy, PromotionPolicy};

// =============================================================================
// Constants
// =============================================================================

/// Default payload size above which admission routes to the last layer (50MB)
pub const DEFAULT_LARGE_OBJECT_BYTES: u64 = 50 * 1024 * 1024;

/// Default interval for the expiry sweep
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default interval for adaptive capacity rescaling
pub const DEFAULT_RESCALE_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default floor for any layer's capacity (1MB)
pub const DEFAULT_MIN_LAYER_BYTES: u64 = 1024 * 1024;

// =============================================================================
// Layer Configuration
// =============================================================================

/// Configuration for a single cache layer.
///
/// Layers are probed in the order they appear in [`CacheConfig::layers`];
/// index 0 is the highest-priority (fastest) layer. Only `max_bytes` is
/// mutated after construction, by adaptive rescaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Layer name, unique within the cache (e.g. "memory", "disk")
    pub name: String,

    /// Maximum resident bytes for this layer
    pub max_bytes: u64,

    /// Maximum entry age before it is treated as expired
    pub max_age: Duration,

    /// Eviction strategy applied under size pressure
    pub strategy: EvictionStrategy,

    /// Compress entries admitted to this layer (above the size threshold)
    pub compress: bool,

    /// Encrypt entries admitted to this layer (large or sensitive payloads)
    pub encrypt: bool,
}

impl LayerConfig {
    /// Create a layer with compression and encryption disabled
    pub fn new(
        name: impl Into<String>,
        max_bytes: u64,
        max_age: Duration,
        strategy: EvictionStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            max_bytes,
            max_age,
            strategy,
            compress: false,
            encrypt: false,
        }
    }

    /// Enable compression for this layer
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Enable encryption for this layer
    pub fn encrypted(mut self) -> Self {
        self.encrypt = true;
        self
    }
}

// =============================================================================
// Admission Policy
// =============================================================================

/// Priority hint supplied at `set` time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Route to the first (fastest) layer
    High,
    /// Size-based routing
    #[default]
    Normal,
    /// Route to the last (largest) layer
    Low,
}

/// Static admission routing policy.
///
/// Explicit layer hints always win; otherwise priority and payload size pick
/// the target. The defaults mirror the shipped product heuristic but carry no
/// guarantee beyond "a layer is always chosen".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionPolicy {
    /// Payloads at or above this size go to the last layer
    pub large_object_bytes: u64,

    /// Content types always routed through encryption on encrypting layers
    pub sensitive_content_types: Vec<String>,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            large_object_bytes: DEFAULT_LARGE_OBJECT_BYTES,
            sensitive_content_types: vec!["application/credentials".to_string()],
        }
    }
}

impl AdmissionPolicy {
    /// Check whether a content type is treated as sensitive
    pub fn is_sensitive(&self, content_type: &str) -> bool {
        self.sensitive_content_types
            .iter()
            .any(|ct| ct == content_type)
    }

    /// Pick a target layer index for a payload with no explicit hint.
    ///
    /// High priority pins the first layer, low priority and oversized
    /// payloads pin the last, everything else lands on the middle layer.
    pub fn target_index(&self, layer_count: usize, logical_size: u64, priority: Priority) -> usize {
        debug_assert!(layer_count > 0);
        match priority {
            Priority::High => 0,
            Priority::Low => layer_count - 1,
            Priority::Normal => {
                if logical_size >= self.large_object_bytes {
                    layer_count - 1
                } else {
                    layer_count / 2
                }
            }
        }
    }
}

// =============================================================================
// Adaptive Scaling Policy
// =============================================================================

/// Bounds and thresholds for the periodic capacity rescale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingPolicy {
    /// Grow a layer whose hit rate exceeds this (while under `max_utilization`)
    pub grow_hit_rate: f64,

    /// Shrink a layer whose hit rate falls below this
    pub shrink_hit_rate: f64,

    /// Fractional capacity change per rescale pass (0.10 = ±10%)
    pub step: f64,

    /// Overall utilization ceiling above which no layer grows
    pub max_utilization: f64,

    /// Capacity floor for any layer
    pub min_layer_bytes: u64,

    /// Global ceiling on the sum of all layer capacities
    pub max_total_bytes: u64,

    /// Minimum samples (hits + misses) before a layer is rescaled
    pub min_samples: u64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            grow_hit_rate: 0.8,
            shrink_hit_rate: 0.3,
            step: 0.10,
            max_utilization: 0.9,
            min_layer_bytes: DEFAULT_MIN_LAYER_BYTES,
            max_total_bytes: 2 * 1024 * 1024 * 1024, // 2GB
            min_samples: 32,
        }
    }
}

impl ScalingPolicy {
    /// Validate threshold ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.grow_hit_rate)
            || !(0.0..=1.0).contains(&self.shrink_hit_rate)
        {
            return Err(Error::Config(
                "hit rate thresholds must be between 0.0 and 1.0".into(),
            ));
        }
        if self.shrink_hit_rate >= self.grow_hit_rate {
            return Err(Error::Config(
                "shrink_hit_rate must be below grow_hit_rate".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.step) || self.step == 0.0 {
            return Err(Error::Config("step must be in (0.0, 1.0)".into()));
        }
        if !(0.0..=1.0).contains(&self.max_utilization) {
            return Err(Error::Config(
                "max_utilization must be between 0.0 and 1.0".into(),
            ));
        }
        if self.min_layer_bytes == 0 {
            return Err(Error::Config("min_layer_bytes must be > 0".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Maintenance Configuration
// =============================================================================

/// Intervals for the background maintenance task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Interval between expiry sweeps
    pub sweep_interval: Duration,

    /// Interval between adaptive rescale passes
    pub rescale_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            rescale_interval: DEFAULT_RESCALE_INTERVAL,
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Layer topology in probe order (index 0 = fastest)
    pub layers: Vec<LayerConfig>,

    /// Admission routing policy
    pub admission: AdmissionPolicy,

    /// Promotion policy for hot entries
    pub promotion: PromotionPolicy,

    /// Compression settings (applies to layers with `compress` set)
    pub compression: CompressionConfig,

    /// Encryption settings (applies to layers with `encrypt` set)
    pub encryption: EncryptionConfig,

    /// Adaptive scaling bounds
    pub scaling: ScalingPolicy,

    /// Background maintenance intervals
    pub maintenance: MaintenanceConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            layers: vec![
                LayerConfig::new(
                    "memory",
                    50 * 1024 * 1024,
                    Duration::from_secs(30 * 60),
                    EvictionStrategy::Lru,
                ),
                LayerConfig::new(
                    "disk",
                    200 * 1024 * 1024,
                    Duration::from_secs(2 * 60 * 60),
                    EvictionStrategy::Lfu,
                )
                .compressed(),
                LayerConfig::new(
                    "network",
                    500 * 1024 * 1024,
                    Duration::from_secs(24 * 60 * 60),
                    EvictionStrategy::Ttl,
                )
                .compressed()
                .encrypted(),
            ],
            admission: AdmissionPolicy::default(),
            promotion: PromotionPolicy::default(),
            compression: CompressionConfig::default(),
            encryption: EncryptionConfig::default(),
            scaling: ScalingPolicy::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Build a config from an explicit layer topology, defaults elsewhere
    pub fn with_layers(layers: Vec<LayerConfig>) -> Self {
        Self {
            layers,
            ..Default::default()
        }
    }

    /// Load a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the full configuration
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(Error::Config("at least one layer is required".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for layer in &self.layers {
            if layer.name.is_empty() {
                return Err(Error::Config("layer names must be non-empty".into()));
            }
            if !seen.insert(layer.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate layer name: {}",
                    layer.name
                )));
            }
            if layer.max_bytes == 0 {
                return Err(Error::Config(format!(
                    "layer '{}' must have non-zero capacity",
                    layer.name
                )));
            }
            if layer.max_age.is_zero() {
                return Err(Error::Config(format!(
                    "layer '{}' must have non-zero max_age",
                    layer.name
                )));
            }
        }

        self.scaling.validate()?;
        self.compression.validate()?;

        let total: u64 = self.layers.iter().map(|l| l.max_bytes).sum();
        if total > self.scaling.max_total_bytes {
            return Err(Error::Config(format!(
                "configured layer capacities ({} bytes) exceed scaling ceiling ({} bytes)",
                total, self.scaling.max_total_bytes
            )));
        }

        Ok(())
    }

    /// Find a layer index by name
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }
}

// =============================================================================
// Tests
// =============================================================================
