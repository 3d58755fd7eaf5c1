//! LFU Cache Metrics
//!
//! Lock-free counters for the concurrent W-TinyLFU cache. Hot-path counters
//! (hits, misses, dropped reads) are bumped by caller threads; policy
//! counters (evictions, admissions) are bumped inside the maintenance
//! section. All use relaxed ordering: totals are exact, cross-counter
//! consistency at a given instant is not.

use super::{CacheMetrics, CoreCacheMetrics};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for a [`ConcurrentLfuCache`](crate::ConcurrentLfuCache).
#[derive(Debug, Default)]
pub struct LfuCacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    updates: AtomicU64,
    dropped_reads: AtomicU64,
    /// Window candidates that won the admission test
    admitted: AtomicU64,
    /// Window candidates that lost it
    rejected: AtomicU64,
}

impl LfuCacheMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped_read(&self) {
        self.dropped_reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_admission(&self, admitted: bool) {
        let counter = if admitted { &self.admitted } else { &self.rejected };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the common counters.
    pub fn snapshot(&self) -> CoreCacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        CoreCacheMetrics {
            requests: hits + self.misses.load(Ordering::Relaxed),
            cache_hits: hits,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            dropped_reads: self.dropped_reads.load(Ordering::Relaxed),
        }
    }

    /// Number of admission tests the window candidate won.
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Number of admission tests the window candidate lost.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.expirations,
            &self.updates,
            &self.dropped_reads,
            &self.admitted,
            &self.rejected,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Converts the counters to a sorted map for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.snapshot().to_btreemap();

        let admitted = self.admitted();
        let rejected = self.rejected();
        metrics.insert("admissions".to_string(), admitted as f64);
        metrics.insert("admission_rejections".to_string(), rejected as f64);
        if admitted + rejected > 0 {
            metrics.insert(
                "admission_rate".to_string(),
                admitted as f64 / (admitted + rejected) as f64,
            );
        }

        metrics
    }
}

impl CacheMetrics for LfuCacheMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "W-TinyLFU"
    }
}
