//! Configuration Validation Tests
//!
//! Invalid configurations must be rejected by the constructor, before any
//! cache exists, with an error naming the offending parameter.

use concurrent_lfu::{
    CapacityPartition, ConcurrentLfuCache, ConcurrentLfuCacheConfig, ConfigError, Expiry,
    NullScheduler, Scoped, ScopedCache,
};
use std::collections::hash_map::RandomState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Config = ConcurrentLfuCacheConfig<u32, u32>;

fn build(config: Config) -> Result<ConcurrentLfuCache<u32, u32>, ConfigError> {
    ConcurrentLfuCache::from_config(config)
}

struct FixedTtl;

impl Expiry<u32, u32> for FixedTtl {
    fn expire_after_create(&self, _key: &u32, _value: &u32) -> Duration {
        Duration::from_secs(1)
    }
}

#[test]
fn test_capacity_below_minimum() {
    for capacity in [0, 1] {
        assert_eq!(
            build(Config::new(capacity)).unwrap_err(),
            ConfigError::CapacityTooSmall {
                capacity,
                minimum: 2
            }
        );
    }
    assert!(build(Config::new(2)).is_ok());
}

#[test]
fn test_zero_concurrency_level() {
    let err = build(Config::new(100).with_concurrency_level(0)).unwrap_err();
    assert_eq!(err, ConfigError::InvalidConcurrencyLevel);
}

#[test]
fn test_conflicting_expiry() {
    let ttl = Duration::from_secs(10);
    let conflicting = [
        Config::new(100)
            .with_expire_after_access(ttl)
            .with_expire_after_write(ttl),
        Config::new(100)
            .with_expire_after_write(ttl)
            .with_expire_after(Arc::new(FixedTtl)),
        Config::new(100)
            .with_expire_after_access(ttl)
            .with_expire_after(Arc::new(FixedTtl)),
    ];
    for config in conflicting {
        assert_eq!(build(config).unwrap_err(), ConfigError::ConflictingExpiry);
    }
}

struct ScopedTtl;

impl Expiry<u32, Scoped<u32>> for ScopedTtl {
    fn expire_after_create(&self, _key: &u32, _value: &Scoped<u32>) -> Duration {
        Duration::from_secs(1)
    }
}

#[test]
fn test_scoped_cache_expiry_options() {
    let custom = ConcurrentLfuCacheConfig::new(100).with_expire_after(Arc::new(ScopedTtl));
    let err = ScopedCache::<u32, u32>::from_config(custom).unwrap_err();
    assert_eq!(err, ConfigError::ScopedCustomExpiry);

    let ttl = Duration::from_secs(1);
    let write = ConcurrentLfuCacheConfig::new(100).with_expire_after_write(ttl);
    assert!(ScopedCache::<u32, u32>::from_config(write).is_ok());
    let access = ConcurrentLfuCacheConfig::new(100).with_expire_after_access(ttl);
    assert!(ScopedCache::<u32, u32>::from_config(access).is_ok());

    // ordinary validation still applies
    let small = ConcurrentLfuCacheConfig::new(1);
    assert!(matches!(
        ScopedCache::<u32, u32>::from_config(small),
        Err(ConfigError::CapacityTooSmall { .. })
    ));
}

#[test]
fn test_rejected_config_builds_nothing() {
    let listener_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&listener_calls);
    let config = Config::new(1).with_removal_listener(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(build(config).is_err());
    // the only other holder of the counter was the dropped config
    assert_eq!(Arc::strong_count(&listener_calls), 1);
    assert_eq!(listener_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_proportions() {
    for (window, protected) in [(0.0, 0.8), (1.0, 0.8), (0.01, 0.0), (0.01, 1.0), (-0.5, 0.5)] {
        assert!(
            matches!(
                CapacityPartition::with_proportions(1000, window, protected),
                Err(ConfigError::InvalidProportion { .. })
            ),
            "({window}, {protected}) should be rejected"
        );
    }
}

#[test]
fn test_default_partition() {
    let partition = CapacityPartition::new(1000).unwrap();
    assert_eq!(partition.window(), 10);
    assert_eq!(partition.protected(), 792);
    assert_eq!(partition.probation(), 198);
    assert_eq!(partition.main(), 990);
}

#[test]
fn test_custom_partition_sets_capacity() {
    let partition = CapacityPartition::with_proportions(500, 0.2, 0.5).unwrap();
    let cache = build(Config::new(2).with_partition(partition)).unwrap();
    assert_eq!(cache.capacity(), 500);
}

#[test]
fn test_accessors_report_configuration() {
    let config = Config::new(64)
        .with_concurrency_level(8)
        .with_maintenance_interval(Duration::from_millis(250))
        .with_metrics(false);
    assert_eq!(config.capacity(), 64);
    assert_eq!(config.concurrency_level(), 8);
    assert_eq!(config.maintenance_interval(), Duration::from_millis(250));
    assert!(!config.metrics_enabled());

    let cache = build(config).unwrap();
    assert_eq!(cache.capacity(), 64);
    assert_eq!(cache.concurrency_level(), 8);
    assert!(cache.stats().is_none());
    assert!(cache.expiry_policy().is_none());
}

#[test]
fn test_default_concurrency_level_is_bounded() {
    let config = Config::new(100);
    assert!((4..=64).contains(&config.concurrency_level()));
}

#[test]
fn test_error_messages() {
    let err = build(Config::new(1)).unwrap_err();
    assert_eq!(err.to_string(), "capacity 1 is below the minimum of 2");

    let err = build(Config::new(10).with_concurrency_level(0)).unwrap_err();
    assert_eq!(err.to_string(), "concurrency level must be greater than zero");

    let err = CapacityPartition::with_proportions(10, 0.01, 1.0).unwrap_err();
    assert!(err.to_string().starts_with("protected proportion 1"));
}

#[test]
fn test_set_capacity_below_minimum() {
    let config = Config::new(10).with_scheduler(Arc::new(NullScheduler::new()));
    let cache = build(config).unwrap();
    for i in 0..10 {
        cache.insert(i, i);
    }
    cache.run_pending_tasks();

    assert!(matches!(
        cache.set_capacity(1),
        Err(ConfigError::CapacityTooSmall { capacity: 1, .. })
    ));
    // a rejected resize leaves the cache untouched
    assert_eq!(cache.capacity(), 10);
    assert_eq!(cache.len(), 10);
}

#[test]
fn test_custom_hasher() {
    let cache: ConcurrentLfuCache<u32, u32, RandomState> =
        ConcurrentLfuCache::init_with_hasher(Config::new(10), RandomState::new()).unwrap();
    cache.insert(1, 1);
    assert_eq!(cache.get(&1), Some(1));

    let err = ConcurrentLfuCache::<u32, u32, RandomState>::init_with_hasher(
        Config::new(0),
        RandomState::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::CapacityTooSmall { .. }));
}
