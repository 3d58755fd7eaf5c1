//! Cache Metrics System
//!
//! Metrics are reported as a `BTreeMap<String, f64>` so that output always
//! appears in the same key order, which keeps logs and test expectations
//! stable.
//!
//! [`CoreCacheMetrics`] is a plain snapshot of the counters every cache
//! keeps. The live counters for the concurrent cache are atomics in
//! [`LfuCacheMetrics`], which can be read while other threads keep updating
//! them.

use std::collections::BTreeMap;

pub mod lfu;

pub use lfu::LfuCacheMetrics;

/// Point-in-time copy of the counters common to every cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoreCacheMetrics {
    /// Total number of lookups
    pub requests: u64,

    /// Lookups that found a live entry
    pub cache_hits: u64,

    /// Entries dropped by the eviction policy
    pub evictions: u64,

    /// Entries dropped because their deadline passed
    pub expirations: u64,

    /// In-place value replacements
    pub updates: u64,

    /// Read events lost to full read buffers
    pub dropped_reads: u64,
}

impl CoreCacheMetrics {
    /// Lookups that missed.
    pub fn cache_misses(&self) -> u64 {
        self.requests - self.cache_hits
    }

    /// Ratio of hits to requests, or 0.0 if nothing was requested.
    pub fn hit_rate(&self) -> f64 {
        if self.requests > 0 {
            self.cache_hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Ratio of misses to requests, or 0.0 if nothing was requested.
    pub fn miss_rate(&self) -> f64 {
        if self.requests > 0 {
            self.cache_misses() as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Converts the snapshot to a sorted map for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        metrics.insert("cache_hits".to_string(), self.cache_hits as f64);
        metrics.insert("cache_misses".to_string(), self.cache_misses() as f64);
        metrics.insert("dropped_reads".to_string(), self.dropped_reads as f64);
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("expirations".to_string(), self.expirations as f64);
        metrics.insert("requests".to_string(), self.requests as f64);
        metrics.insert("updates".to_string(), self.updates as f64);

        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert("miss_rate".to_string(), self.miss_rate());

        if self.requests > 0 {
            metrics.insert(
                "eviction_rate".to_string(),
                self.evictions as f64 / self.requests as f64,
            );
        }

        metrics
    }
}

/// Uniform metrics reporting for caches and their decorators.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// A static string identifying the cache algorithm.
    fn algorithm_name(&self) -> &'static str;
}
