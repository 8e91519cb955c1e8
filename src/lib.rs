//! StrataCache - Multi-Layer In-Process Cache
//!
//! A configurable cache built from an ordered stack of named layers, each
//! with its own capacity, age limit, eviction strategy, and optional
//! compression and encryption. Values are admitted to a layer by size and
//! priority, promoted toward the front of the stack as they get hot, and
//! aged out by background maintenance.
//!
//! # Architecture
//!
//! ```text
//! set(key, value) → Admission → [ memory | disk | network | ... ]
//!                                    ↑ promote      sweep/rescale ↑
//! get(key)        → probe in order ──┘          MaintenanceHandle ┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use stratacache::{SetOptions, StrataCache};
//!
//! # fn main() -> stratacache::Result<()> {
//! let cache = StrataCache::with_defaults()?;
//! cache.set("user:42", &"profile data", SetOptions::default())?;
//! let value: Option<String> = cache.get("user:42")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`] - Layer topology and tuning knobs
//! - [`manager`] - The cache itself: admission, lookup, promotion, optimize
//! - [`layer`] - A single layer: concurrent store, eviction, accounting
//! - [`policy`] - Eviction strategies and promotion thresholds
//! - [`codec`] - Serialization and LZ4 compression
//! - [`crypto`] - AES-256-GCM payload sealing
//! - [`stats`] - Per-layer counters and snapshot reports
//! - [`maintenance`] - Cancellable background sweep/rescale task
//! - [`error`] - Error types

pub mod codec;
pub mod config;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod layer;
pub mod maintenance;
pub mod manager;
pub mod policy;
pub mod stats;

// Re-export commonly used types
pub use codec::{CompressionAlgorithm, CompressionConfig};
pub use config::{
    AdmissionPolicy, CacheConfig, LayerConfig, MaintenanceConfig, Priority, ScalingPolicy,
};
pub use crypto::EncryptionConfig;
pub use error::{Error, Result};
pub use maintenance::MaintenanceHandle;
pub use manager::{CapacityChange, OptimizeReport, SetOptions, StrataCache};
pub use policy::{EvictionStrategy, PromotionPolicy};
pub use stats::{CacheStatsReport, LayerStatsSnapshot};
