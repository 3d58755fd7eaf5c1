//! Stress Tests for the Concurrent Cache
//!
//! These tests verify thread safety and correctness under high contention.

use concurrent_lfu::{
    AtomicFactory, AtomicFactoryCache, BackgroundThreadScheduler, Cache, ConcurrentLfuCache,
    ConcurrentLfuCacheConfig, NullScheduler,
};
use scoped_threadpool::Pool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const NUM_THREADS: usize = 16;
const OPS_PER_THREAD: usize = 10_000;

fn config(capacity: usize, stripes: usize) -> ConcurrentLfuCacheConfig<usize, usize> {
    ConcurrentLfuCacheConfig::new(capacity).with_concurrency_level(stripes)
}

#[test]
fn stress_high_contention() {
    let cache: Arc<ConcurrentLfuCache<usize, usize>> =
        Arc::new(ConcurrentLfuCache::from_config(config(100, 16)).unwrap());

    let mut handles = Vec::new();
    for t in 0..NUM_THREADS {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let key = i % 10; // Only 10 keys for high contention
                if t % 2 == 0 {
                    cache.insert(key, t * OPS_PER_THREAD + i);
                } else {
                    let _ = cache.get(&key);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    cache.run_pending_tasks();
    assert!(cache.len() <= 10);
}

/// Test with various stripe counts
#[test]
fn stress_stripe_counts() {
    for stripes in [1, 2, 4, 8, 16, 32] {
        let cache: ConcurrentLfuCache<usize, usize> =
            ConcurrentLfuCache::from_config(config(1000, stripes)).unwrap();
        let mut pool = Pool::new(8);

        pool.scoped(|scope| {
            for t in 0..8 {
                let cache = &cache;
                scope.execute(move || {
                    for i in 0..1000 {
                        cache.insert(t * 1000 + i, i);
                        let _ = cache.get(&(t * 1000 + i));
                    }
                });
            }
        });

        cache.run_pending_tasks();
        assert_eq!(cache.concurrency_level(), stripes);
        assert_eq!(cache.len(), 1000);
    }
}

/// Test edge case: the smallest allowed cache
#[test]
fn stress_minimum_capacity_cache() {
    let cache: ConcurrentLfuCache<usize, usize> =
        ConcurrentLfuCache::from_config(config(2, 4)).unwrap();
    let mut pool = Pool::new(NUM_THREADS as u32);

    pool.scoped(|scope| {
        for t in 0..NUM_THREADS {
            let cache = &cache;
            scope.execute(move || {
                for i in 0..1000 {
                    cache.insert(t * 1000 + i, i);
                    let _ = cache.get(&(t * 1000 + i));
                }
            });
        }
    });

    cache.run_pending_tasks();
    assert!(cache.len() <= 2);
}

/// Test concurrent removes
#[test]
fn stress_concurrent_removes() {
    let cache: Arc<ConcurrentLfuCache<usize, usize>> =
        Arc::new(ConcurrentLfuCache::from_config(config(1000, 16)).unwrap());

    for i in 0..1000 {
        cache.insert(i, i);
    }

    let removed_count = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for _ in 0..NUM_THREADS {
        let cache = Arc::clone(&cache);
        let removed = Arc::clone(&removed_count);
        handles.push(thread::spawn(move || {
            for i in 0..1000 {
                if cache.remove(&i).is_some() {
                    removed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // each key is removed by exactly one thread
    assert_eq!(removed_count.load(Ordering::Relaxed), 1000);
    assert!(cache.is_empty());
}

/// Test concurrent clear operations
#[test]
fn stress_concurrent_clear() {
    let cache: Arc<ConcurrentLfuCache<usize, usize>> =
        Arc::new(ConcurrentLfuCache::from_config(config(1000, 16)).unwrap());

    let mut handles = Vec::new();
    for t in 0..NUM_THREADS {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..1000 {
                cache.insert(t * 1000 + i, i);
                if i % 100 == 0 {
                    cache.clear();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    cache.run_pending_tasks();
    assert!(cache.len() <= 1000);
}

/// Test caller-driven maintenance under load
#[test]
fn stress_null_scheduler() {
    let config = config(500, 8).with_scheduler(Arc::new(NullScheduler::new()));
    let cache: ConcurrentLfuCache<usize, usize> = ConcurrentLfuCache::from_config(config).unwrap();
    let mut pool = Pool::new(8);

    pool.scoped(|scope| {
        for t in 0..8 {
            let cache = &cache;
            scope.execute(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = (t * 31 + i) % 2_000;
                    cache.insert(key, i);
                    let _ = cache.get(&(key / 2));
                }
            });
        }
    });

    cache.run_pending_tasks();
    assert!(cache.len() <= 500);
}

/// Test background maintenance with readers and writers mixed
#[test]
fn stress_background_scheduler() {
    let config = config(1000, 16).with_scheduler(Arc::new(BackgroundThreadScheduler::new()));
    let cache: Arc<ConcurrentLfuCache<usize, usize>> =
        Arc::new(ConcurrentLfuCache::from_config(config).unwrap());

    let mut handles = Vec::new();
    for t in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let key = (t * OPS_PER_THREAD + i) % 5_000;
                if i % 3 == 0 {
                    cache.insert(key, i);
                } else if let Some(v) = cache.get(&key) {
                    assert!(v < OPS_PER_THREAD);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    cache.run_pending_tasks();
    assert!(cache.len() <= 1000);
}

/// Test the single-flight decorator under contention
#[test]
fn stress_atomic_factory() {
    let inner: ConcurrentLfuCache<usize, AtomicFactory<usize>> =
        ConcurrentLfuCache::new(10_000).unwrap();
    let cache = AtomicFactoryCache::new(inner);
    let calls = AtomicUsize::new(0);
    let mut pool = Pool::new(NUM_THREADS as u32);

    pool.scoped(|scope| {
        for _ in 0..NUM_THREADS {
            let cache = &cache;
            let calls = &calls;
            scope.execute(move || {
                for key in 0..500 {
                    let value = cache.get_or_add(key, |k| {
                        calls.fetch_add(1, Ordering::Relaxed);
                        thread::sleep(Duration::from_micros(50));
                        k * 3
                    });
                    assert_eq!(value, key * 3);
                }
            });
        }
    });

    assert_eq!(calls.load(Ordering::Relaxed), 500);
    assert_eq!(cache.len(), 500);
}

/// Test get_with under contention
#[test]
fn stress_get_with() {
    let cache: Arc<ConcurrentLfuCache<usize, Vec<u8>>> =
        Arc::new(ConcurrentLfuCache::new(1000).unwrap());
    for i in 0..100 {
        cache.insert(i, vec![0u8; i]);
    }

    let mut handles = Vec::new();
    for _ in 0..NUM_THREADS {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..1000 {
                let key = i % 100;
                let len = cache.get_with(&key, |v| v.len());
                assert_eq!(len, Some(key));
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
}
