//! Cache statistics
//!
//! Per-layer atomic counters plus serializable snapshots. Counters
//! accumulate for the process lifetime and reset only on `clear()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

// =============================================================================
// Latency Tracking
// =============================================================================

/// Measures elapsed time for a single cache operation
pub struct LatencyTracker {
    start: Instant,
}

impl LatencyTracker {
    /// Start tracking
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

// =============================================================================
// Per-Layer Counters
// =============================================================================

/// Live statistics for one layer
#[derive(Debug, Default)]
pub struct LayerStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    promotions_in: AtomicU64,
    promotions_out: AtomicU64,
    access_time_ns: AtomicU64,
    access_samples: AtomicU64,
}

impl LayerStats {
    /// Record a hit and its lookup latency
    pub fn record_hit(&self, latency: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.access_time_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        self.access_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction under size pressure
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an expiry removal
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry promoted into this layer
    pub fn record_promotion_in(&self) {
        self.promotions_in.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry promoted out of this layer
    pub fn record_promotion_out(&self) {
        self.promotions_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hit rate over all lookups that touched this layer
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Total lookups (hits + misses) recorded against this layer
    pub fn samples(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Average hit latency
    pub fn avg_access_time(&self) -> Duration {
        let samples = self.access_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.access_time_ns.load(Ordering::Relaxed) / samples)
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.promotions_in.store(0, Ordering::Relaxed);
        self.promotions_out.store(0, Ordering::Relaxed);
        self.access_time_ns.store(0, Ordering::Relaxed);
        self.access_samples.store(0, Ordering::Relaxed);
    }

    /// Build a snapshot with the layer's current occupancy
    pub fn snapshot(
        &self,
        name: &str,
        resident_bytes: u64,
        capacity_bytes: u64,
        entries: usize,
    ) -> LayerStatsSnapshot {
        LayerStatsSnapshot {
            name: name.to_string(),
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            expirations: self.expirations.load(Ordering::Relaxed),
            promotions_in: self.promotions_in.load(Ordering::Relaxed),
            promotions_out: self.promotions_out.load(Ordering::Relaxed),
            resident_bytes,
            capacity_bytes,
            entries,
            hit_rate: self.hit_rate(),
            avg_access_time_us: self.avg_access_time().as_micros() as u64,
        }
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Point-in-time statistics for one layer
#[derive(Debug, Clone, Serialize)]
pub struct LayerStatsSnapshot {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub promotions_in: u64,
    pub promotions_out: u64,
    pub resident_bytes: u64,
    pub capacity_bytes: u64,
    pub entries: usize,
    pub hit_rate: f64,
    pub avg_access_time_us: u64,
}

impl LayerStatsSnapshot {
    /// Utilization fraction (0.0 - 1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.resident_bytes as f64 / self.capacity_bytes as f64
        }
    }
}

/// Point-in-time statistics for the whole cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    /// When the snapshot was captured
    pub captured_at: DateTime<Utc>,
    /// Per-layer snapshots in probe order
    pub layers: Vec<LayerStatsSnapshot>,
    /// Sum of resident bytes across layers
    pub total_resident_bytes: u64,
    /// Sum of configured capacities across layers
    pub total_capacity_bytes: u64,
    /// Hit rate over all lookups (any-layer hit / total lookups)
    pub overall_hit_rate: f64,
}

impl CacheStatsReport {
    /// Assemble a report from per-layer snapshots
    pub fn from_layers(layers: Vec<LayerStatsSnapshot>) -> Self {
        let total_resident_bytes = layers.iter().map(|l| l.resident_bytes).sum();
        let total_capacity_bytes = layers.iter().map(|l| l.capacity_bytes).sum();

        // A lookup that misses records a miss in every layer; one that hits
        // records exactly one hit. Total lookups = hits + misses of the last
        // layer (every lookup reaches it unless an earlier layer hit).
        let hits: u64 = layers.iter().map(|l| l.hits).sum();
        let lookups = hits + layers.last().map(|l| l.misses).unwrap_or(0);
        let overall_hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        Self {
            captured_at: Utc::now(),
            layers,
            total_resident_bytes,
            total_capacity_bytes,
            overall_hit_rate,
        }
    }

    /// Overall utilization fraction
    pub fn utilization(&self) -> f64 {
        if self.total_capacity_bytes == 0 {
            0.0
        } else {
            self.total_resident_bytes as f64 / self.total_capacity_bytes as f64
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
