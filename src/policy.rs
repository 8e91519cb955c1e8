//! Eviction and promotion policies
//!
//! Per-layer eviction strategies and the cross-layer promotion rule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Eviction strategy applied when a layer is over capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EvictionStrategy {
    /// Least Recently Used - evict by oldest access
    #[default]
    Lru,
    /// Least Frequently Used - evict by lowest access count
    Lfu,
    /// Time To Live - evict by oldest creation
    Ttl,
    /// Adaptive - evict by combined recency/frequency score
    Adaptive,
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionStrategy::Lru => write!(f, "LRU"),
            EvictionStrategy::Lfu => write!(f, "LFU"),
            EvictionStrategy::Ttl => write!(f, "TTL"),
            EvictionStrategy::Adaptive => write!(f, "Adaptive"),
        }
    }
}

impl EvictionStrategy {
    /// Compute the eviction rank for an entry. Higher rank = evicted first.
    ///
    /// `idle` is time since last access, `age` time since creation.
    pub fn eviction_rank(&self, idle: Duration, age: Duration, access_count: u32) -> f64 {
        match self {
            EvictionStrategy::Lru => idle.as_secs_f64(),
            EvictionStrategy::Lfu => 1.0 / (access_count as f64 + 1.0),
            EvictionStrategy::Ttl => age.as_secs_f64(),
            EvictionStrategy::Adaptive => idle.as_secs_f64() / (access_count as f64 + 1.0),
        }
    }

    /// Check whether an entry is still valid under this strategy.
    ///
    /// Every strategy expires entries past the layer's `max_age`. Adaptive
    /// additionally retires entries that have aged past half their budget
    /// with no reuse, so one-shot inserts don't linger in adaptive layers.
    pub fn is_valid(&self, age: Duration, access_count: u32, max_age: Duration) -> bool {
        if age > max_age {
            return false;
        }
        if let EvictionStrategy::Adaptive = self {
            if age > max_age / 2 && access_count <= 1 {
                return false;
            }
        }
        true
    }
}

/// Promotion policy for moving hot entries toward faster layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionPolicy {
    /// Access count at which an entry is moved one layer up
    pub access_threshold: u32,

    /// Enable promotion at all
    pub enabled: bool,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            access_threshold: 3,
            enabled: true,
        }
    }
}

impl PromotionPolicy {
    /// Check whether an entry with this access count should be promoted
    pub fn should_promote(&self, access_count: u32) -> bool {
        self.enabled && access_count >= self.access_threshold
    }
}

// =============================================================================
// Tests
// =============================================================================
