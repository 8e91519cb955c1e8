//! A single cache layer
//!
//! Each layer owns a concurrent entry map, a resident-size counter, and its
//! stats. The size counter and the map are only ever mutated together under
//! the layer's write lock, which keeps the accounting invariant
//! (`resident == sum of stored entry sizes`) exact.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::LayerConfig;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::policy::EvictionStrategy;
use crate::stats::{LatencyTracker, LayerStats, LayerStatsSnapshot};

/// One tier of the multi-layer cache
pub struct CacheLayer {
    name: String,
    strategy: EvictionStrategy,
    max_age: Duration,
    compress: bool,
    encrypt: bool,
    /// Configured capacity; mutated only by adaptive rescaling
    capacity: AtomicU64,
    /// Resident entries
    entries: DashMap<String, CacheEntry>,
    /// Resident bytes
    resident: AtomicU64,
    /// Serializes insert/evict/sweep so eviction never over-shoots
    write_lock: Mutex<()>,
    /// Layer statistics
    stats: LayerStats,
}

impl CacheLayer {
    /// Build a layer from its configuration
    pub fn new(config: &LayerConfig) -> Self {
        Self {
            name: config.name.clone(),
            strategy: config.strategy,
            max_age: config.max_age,
            compress: config.compress,
            encrypt: config.encrypt,
            capacity: AtomicU64::new(config.max_bytes),
            entries: DashMap::new(),
            resident: AtomicU64::new(0),
            write_lock: Mutex::new(()),
            stats: LayerStats::default(),
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Probe for a key.
    ///
    /// A stale entry (per the layer's strategy and `max_age`) is removed on
    /// the spot and reported as a miss. On a hit the entry's access
    /// bookkeeping is bumped before the returned clone is taken, so the
    /// clone carries the updated count.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let tracker = LatencyTracker::start();

        let stale = match self.entries.get(key) {
            Some(entry) => {
                let meta = &entry.value().metadata;
                if self
                    .strategy
                    .is_valid(meta.age(), meta.access_count(), self.max_age)
                {
                    entry.value().record_access();
                    let hit = entry.value().clone();
                    drop(entry);
                    self.stats.record_hit(tracker.elapsed());
                    return Some(hit);
                }
                true
            }
            None => false,
        };

        if stale {
            let _guard = self.write_lock.lock();
            if let Some((_, removed)) = self.entries.remove(key) {
                self.resident
                    .fetch_sub(removed.stored_size(), Ordering::Relaxed);
                self.stats.record_expiration();
            }
            trace!(layer = %self.name, key, "entry expired on probe");
        }

        self.stats.record_miss();
        None
    }

    /// Check for a key without touching access bookkeeping or stats
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // =========================================================================
    // Insert / Remove
    // =========================================================================

    /// Insert an entry, evicting by strategy until it fits.
    ///
    /// Replacing an existing key debits the old entry before crediting the
    /// new one. Returns `EntryTooLarge` when the entry exceeds the layer's
    /// whole capacity.
    pub fn insert(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let size = entry.stored_size();
        let capacity = self.capacity();

        if size > capacity {
            return Err(Error::EntryTooLarge {
                key: key.to_string(),
                size,
                layer: self.name.clone(),
                capacity,
            });
        }

        let _guard = self.write_lock.lock();

        if let Some((_, old)) = self.entries.remove(key) {
            self.resident.fetch_sub(old.stored_size(), Ordering::Relaxed);
        }

        self.evict_locked(size);

        self.entries.insert(key.to_string(), entry);
        self.resident.fetch_add(size, Ordering::Relaxed);
        Ok(())
    }

    /// Remove an entry
    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        let _guard = self.write_lock.lock();
        let (_, entry) = self.entries.remove(key)?;
        self.resident
            .fetch_sub(entry.stored_size(), Ordering::Relaxed);
        Some(entry)
    }

    /// Remove an entry as part of a promotion (counts as promotion-out)
    pub fn take_for_promotion(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.remove(key)?;
        self.stats.record_promotion_out();
        Some(entry)
    }

    /// Insert an entry arriving via promotion (counts as promotion-in)
    pub fn insert_promoted(&self, key: &str, entry: CacheEntry) -> Result<()> {
        self.insert(key, entry)?;
        self.stats.record_promotion_in();
        Ok(())
    }

    // =========================================================================
    // Eviction / Sweeps
    // =========================================================================

    /// Evict by strategy rank until `incoming` extra bytes fit.
    /// Caller must hold the write lock.
    fn evict_locked(&self, incoming: u64) {
        let capacity = self.capacity();
        if self.resident.load(Ordering::Relaxed) + incoming <= capacity {
            return;
        }

        // Rank every resident entry; stale entries always go first
        let mut candidates: Vec<(String, f64, u64)> = self
            .entries
            .iter()
            .map(|item| {
                let meta = &item.value().metadata;
                let rank = if self
                    .strategy
                    .is_valid(meta.age(), meta.access_count(), self.max_age)
                {
                    self.strategy
                        .eviction_rank(meta.idle(), meta.age(), meta.access_count())
                } else {
                    f64::MAX
                };
                (item.key().clone(), rank, meta.stored_size())
            })
            .collect();

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut evicted = 0u64;
        for (key, _, _) in candidates {
            if self.resident.load(Ordering::Relaxed) + incoming <= capacity {
                break;
            }
            if let Some((_, removed)) = self.entries.remove(&key) {
                self.resident
                    .fetch_sub(removed.stored_size(), Ordering::Relaxed);
                self.stats.record_eviction();
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(layer = %self.name, evicted, "evicted entries under size pressure");
        }
    }

    /// Drop every stale entry, then re-evict if still over capacity.
    ///
    /// Returns (expired, evicted) counts.
    pub fn sweep(&self) -> (u64, u64) {
        let _guard = self.write_lock.lock();

        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|item| {
                let meta = &item.value().metadata;
                !self
                    .strategy
                    .is_valid(meta.age(), meta.access_count(), self.max_age)
            })
            .map(|item| item.key().clone())
            .collect();

        let mut expired = 0u64;
        for key in stale {
            if let Some((_, removed)) = self.entries.remove(&key) {
                self.resident
                    .fetch_sub(removed.stored_size(), Ordering::Relaxed);
                self.stats.record_expiration();
                expired += 1;
            }
        }

        let before = self.stats.evictions();
        self.evict_locked(0);
        let evicted = self.stats.evictions() - before;

        (expired, evicted)
    }

    /// Clear all entries and reset statistics
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.entries.clear();
        self.resident.store(0, Ordering::Relaxed);
        self.stats.reset();
    }

    // =========================================================================
    // Capacity / Introspection
    // =========================================================================

    /// Configured capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Update the configured capacity (adaptive rescaling).
    ///
    /// Shrinking below the current resident size triggers an immediate
    /// evict-down.
    pub fn set_capacity(&self, capacity: u64) {
        self.capacity.store(capacity, Ordering::Relaxed);
        let _guard = self.write_lock.lock();
        self.evict_locked(0);
    }

    /// Resident bytes
    pub fn resident_bytes(&self) -> u64 {
        self.resident.load(Ordering::Relaxed)
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the layer holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether admitted entries should be compressed
    pub fn compress(&self) -> bool {
        self.compress
    }

    /// Whether admitted entries should be encrypted
    pub fn encrypt(&self) -> bool {
        self.encrypt
    }

    /// Eviction strategy
    pub fn strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    /// Layer statistics
    pub fn stats(&self) -> &LayerStats {
        &self.stats
    }

    /// Statistics snapshot including occupancy
    pub fn snapshot(&self) -> LayerStatsSnapshot {
        self.stats.snapshot(
            &self.name,
            self.resident_bytes(),
            self.capacity(),
            self.len(),
        )
    }
}

impl std::fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("capacity", &self.capacity())
            .field("resident", &self.resident_bytes())
            .field("entries", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
