//! Cache Configuration Module
//!
//! A cache is built from a [`ConcurrentLfuCacheConfig`]: a required capacity
//! plus builder methods for everything else. Nothing is checked while the
//! builder is being assembled; [`ConcurrentLfuCacheConfig::validate`] runs
//! when the cache is constructed and reports the first problem as a
//! [`ConfigError`](crate::error::ConfigError).
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ConcurrentLfuCacheConfig`] | all construction-time parameters |
//! | [`CapacityPartition`] | how capacity splits into Window / Probation / Protected |
//!
//! # Examples
//!
//! ```
//! use concurrent_lfu::config::{CapacityPartition, ConcurrentLfuCacheConfig};
//! use concurrent_lfu::ConcurrentLfuCache;
//!
//! let partition = CapacityPartition::with_proportions(1000, 0.05, 0.8).unwrap();
//! let config = ConcurrentLfuCacheConfig::new(0).with_partition(partition);
//! let cache: ConcurrentLfuCache<String, i32> = ConcurrentLfuCache::from_config(config).unwrap();
//! assert_eq!(cache.capacity(), 1000);
//! ```

pub mod concurrent_lfu;
pub mod partition;

pub use concurrent_lfu::{default_concurrency_level, ConcurrentLfuCacheConfig};
pub use partition::CapacityPartition;
