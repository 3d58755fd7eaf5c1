//! Configuration for the concurrent W-TinyLFU cache.

use super::partition::CapacityPartition;
use crate::error::ConfigError;
use crate::expiry::{Clock, Expiry, ExpiryPolicy, SystemClock};
use crate::notification::{RemovalCause, RemovalListener};
use crate::scheduler::{ForegroundScheduler, Scheduler};
use core::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between time-triggered drains.
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

/// Returns the default number of stripes based on available parallelism.
pub fn default_concurrency_level() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(16)
        .clamp(4, 64)
}

/// Configuration for a [`ConcurrentLfuCache`](crate::ConcurrentLfuCache).
///
/// This is the only way to configure a cache. Builder methods never fail;
/// every parameter is validated together when the cache is constructed, so
/// an invalid combination produces a [`ConfigError`] and no cache.
///
/// # Required Parameters
///
/// - `capacity`: maximum number of resident entries (set in constructor),
///   or a [`CapacityPartition`] via [`with_partition`](Self::with_partition)
///
/// # Optional Parameters (Builder Methods)
///
/// | Method | Default |
/// |--------|---------|
/// | `with_concurrency_level` | available parallelism, clamped to 4..=64 |
/// | `with_scheduler` | [`ForegroundScheduler`] |
/// | `with_expire_after_access` / `_write` / `with_expire_after` | no expiry |
/// | `with_clock` | [`SystemClock`] |
/// | `with_removal_listener` | none |
/// | `with_maintenance_interval` | 1 second |
/// | `with_metrics` | enabled |
///
/// # Examples
///
/// ```
/// use concurrent_lfu::config::ConcurrentLfuCacheConfig;
/// use concurrent_lfu::ConcurrentLfuCache;
/// use std::time::Duration;
///
/// let config = ConcurrentLfuCacheConfig::new(10_000)
///     .with_concurrency_level(8)
///     .with_expire_after_write(Duration::from_secs(60));
/// let cache: ConcurrentLfuCache<u64, String> = ConcurrentLfuCache::from_config(config).unwrap();
/// assert_eq!(cache.capacity(), 10_000);
/// ```
pub struct ConcurrentLfuCacheConfig<K, V> {
    capacity: usize,
    partition: Option<CapacityPartition>,
    concurrency_level: usize,
    scheduler: Arc<dyn Scheduler>,
    expire_after_access: Option<Duration>,
    expire_after_write: Option<Duration>,
    expire_after: Option<Arc<dyn Expiry<K, V>>>,
    clock: Arc<dyn Clock>,
    removal_listener: Option<RemovalListener<K, V>>,
    maintenance_interval: Duration,
    metrics: bool,
}

impl<K, V> ConcurrentLfuCacheConfig<K, V> {
    /// Creates a configuration for a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        ConcurrentLfuCacheConfig {
            capacity,
            partition: None,
            concurrency_level: default_concurrency_level(),
            scheduler: Arc::new(ForegroundScheduler::new()),
            expire_after_access: None,
            expire_after_write: None,
            expire_after: None,
            clock: Arc::new(SystemClock::new()),
            removal_listener: None,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            metrics: true,
        }
    }

    /// Uses an explicit segment split. Overrides the constructor capacity.
    #[must_use]
    pub fn with_partition(mut self, partition: CapacityPartition) -> Self {
        self.capacity = partition.capacity();
        self.partition = Some(partition);
        self
    }

    /// Sets the number of table and read-buffer stripes.
    #[must_use]
    pub fn with_concurrency_level(mut self, level: usize) -> Self {
        self.concurrency_level = level;
        self
    }

    /// Sets where maintenance runs.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Expires entries `ttl` after their last read or write.
    #[must_use]
    pub fn with_expire_after_access(mut self, ttl: Duration) -> Self {
        self.expire_after_access = Some(ttl);
        self
    }

    /// Expires entries `ttl` after their last write.
    #[must_use]
    pub fn with_expire_after_write(mut self, ttl: Duration) -> Self {
        self.expire_after_write = Some(ttl);
        self
    }

    /// Computes each entry's lifetime with `expiry`.
    #[must_use]
    pub fn with_expire_after(mut self, expiry: Arc<dyn Expiry<K, V>>) -> Self {
        self.expire_after = Some(expiry);
        self
    }

    /// Sets the time source used for expiry and the maintenance tick.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a callback for entries leaving the cache.
    #[must_use]
    pub fn with_removal_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&K, &V, RemovalCause) + Send + Sync + 'static,
    {
        self.removal_listener = Some(Arc::new(listener));
        self
    }

    /// Sets how long buffered events may wait before a drain is requested.
    #[must_use]
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Enables or disables hit/miss/eviction counters.
    #[must_use]
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// Requested capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Requested stripe count.
    #[inline]
    pub fn concurrency_level(&self) -> usize {
        self.concurrency_level
    }

    /// Configured maintenance interval.
    #[inline]
    pub fn maintenance_interval(&self) -> Duration {
        self.maintenance_interval
    }

    /// Whether metrics are collected.
    #[inline]
    pub fn metrics_enabled(&self) -> bool {
        self.metrics
    }

    /// Checks every parameter and resolves the capacity split and expiry
    /// policy.
    pub fn validate(&self) -> Result<(CapacityPartition, Option<ExpiryPolicy<K, V>>), ConfigError> {
        let partition = match self.partition {
            Some(partition) => partition,
            None => CapacityPartition::new(self.capacity)?,
        };
        if self.concurrency_level == 0 {
            return Err(ConfigError::InvalidConcurrencyLevel);
        }

        let expiry = match (
            self.expire_after_access,
            self.expire_after_write,
            &self.expire_after,
        ) {
            (None, None, None) => None,
            (Some(ttl), None, None) => Some(ExpiryPolicy::AfterAccess(ttl)),
            (None, Some(ttl), None) => Some(ExpiryPolicy::AfterWrite(ttl)),
            (None, None, Some(calc)) => Some(ExpiryPolicy::Custom(Arc::clone(calc))),
            _ => return Err(ConfigError::ConflictingExpiry),
        };

        Ok((partition, expiry))
    }

    pub(crate) fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn removal_listener(&self) -> Option<&RemovalListener<K, V>> {
        self.removal_listener.as_ref()
    }
}

impl<K, V> Clone for ConcurrentLfuCacheConfig<K, V> {
    fn clone(&self) -> Self {
        ConcurrentLfuCacheConfig {
            capacity: self.capacity,
            partition: self.partition,
            concurrency_level: self.concurrency_level,
            scheduler: Arc::clone(&self.scheduler),
            expire_after_access: self.expire_after_access,
            expire_after_write: self.expire_after_write,
            expire_after: self.expire_after.clone(),
            clock: Arc::clone(&self.clock),
            removal_listener: self.removal_listener.clone(),
            maintenance_interval: self.maintenance_interval,
            metrics: self.metrics,
        }
    }
}

impl<K, V> fmt::Debug for ConcurrentLfuCacheConfig<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentLfuCacheConfig")
            .field("capacity", &self.capacity)
            .field("partition", &self.partition)
            .field("concurrency_level", &self.concurrency_level)
            .field("scheduler", &self.scheduler)
            .field("expire_after_access", &self.expire_after_access)
            .field("expire_after_write", &self.expire_after_write)
            .field("expire_after", &self.expire_after.is_some())
            .field("removal_listener", &self.removal_listener.is_some())
            .field("maintenance_interval", &self.maintenance_interval)
            .field("metrics", &self.metrics)
            .finish()
    }
}
