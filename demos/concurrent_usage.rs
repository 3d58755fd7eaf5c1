//! Concurrent Cache Usage Examples
//!
//! This example demonstrates multi-threaded usage patterns for the concurrent
//! W-TinyLFU cache.
//!
//! Run with: cargo run --example concurrent_usage

extern crate concurrent_lfu;

use concurrent_lfu::config::ConcurrentLfuCacheConfig;
use concurrent_lfu::{
    AtomicFactory, AtomicFactoryCache, BackgroundThreadScheduler, Cache, ConcurrentLfuCache,
    NullScheduler, RemovalCause,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() {
    println!("Concurrent Cache Usage Examples");
    println!("================================\n");

    basic_concurrent_usage();
    println!();

    zero_copy_get_with();
    println!();

    scan_resistance();
    println!();

    schedulers();
    println!();

    single_flight_loading();
    println!();

    throughput_comparison();
}

/// Basic multi-threaded cache usage
fn basic_concurrent_usage() {
    println!("1. Basic Concurrent Usage");
    println!("   -----------------------");

    let cache: Arc<ConcurrentLfuCache<String, usize>> =
        Arc::new(ConcurrentLfuCache::new(1000).unwrap());

    let num_threads = 4;
    let ops_per_thread = 1000;

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let key = format!("thread{}-key{}", thread_id, i);
                    let value = thread_id * 10000 + i;

                    cache.insert(key.clone(), value);

                    // a concurrent drain may already have evicted it
                    if let Some(v) = cache.get(&key) {
                        assert_eq!(v, value);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    cache.run_pending_tasks();

    println!(
        "   Completed {} operations across {} threads",
        num_threads * ops_per_thread * 2,
        num_threads
    );
    println!(
        "   Final cache size: {} items (capacity {})",
        cache.len(),
        cache.capacity()
    );
}

/// Zero-copy access pattern using get_with()
fn zero_copy_get_with() {
    println!("2. Zero-Copy Access with get_with()");
    println!("   ----------------------------------");

    let cache: ConcurrentLfuCache<String, Vec<u8>> = ConcurrentLfuCache::new(100).unwrap();

    cache.insert("large_key".to_string(), vec![1u8; 1024]);

    let sum: Option<u64> = cache.get_with("large_key", |data| {
        data.iter().map(|&x| x as u64).sum()
    });

    println!("   Stored 1KB of data in cache");
    println!(
        "   Computed sum without cloning: {}",
        sum.unwrap_or_default()
    );
    println!("   get() returns a clone - use get_with() to avoid cloning");
}

/// A burst of one-off keys does not flush the frequently used ones
fn scan_resistance() {
    println!("3. Scan Resistance");
    println!("   ----------------");

    let evicted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evicted);
    let config = ConcurrentLfuCacheConfig::new(100).with_removal_listener(
        move |_: &u64, _: &u64, cause| {
            if cause == RemovalCause::Evicted {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        },
    );
    let cache: ConcurrentLfuCache<u64, u64> = ConcurrentLfuCache::from_config(config).unwrap();

    for key in 0..80 {
        cache.insert(key, key);
    }
    for _ in 0..5 {
        for key in 0..80 {
            cache.get(&key);
        }
    }

    for key in 10_000..20_000 {
        cache.insert(key, key);
    }
    cache.run_pending_tasks();

    let hot = (0..80).filter(|key| cache.contains_key(key)).count();
    println!("   Scanned 10000 one-off keys through a 100-entry cache");
    println!("   Hot keys still resident: {}/80", hot);
    println!("   Evictions reported: {}", evicted.load(Ordering::Relaxed));
    if let Some(frequency) = cache.frequency(&0) {
        println!("   Frequency estimate of key 0: {}", frequency);
    }
}

/// Where maintenance runs
fn schedulers() {
    println!("4. Maintenance Schedulers");
    println!("   -----------------------");

    // Default: drains run inline on the thread that filled a buffer
    let foreground: ConcurrentLfuCache<u32, u32> = ConcurrentLfuCache::new(10).unwrap();
    for i in 0..100 {
        foreground.insert(i, i);
    }
    println!("   Foreground: len after 100 inserts = {}", foreground.len());

    // Background: a dedicated thread drains, callers never block on the policy
    let config = ConcurrentLfuCacheConfig::new(10)
        .with_scheduler(Arc::new(BackgroundThreadScheduler::new()));
    let background: ConcurrentLfuCache<u32, u32> =
        ConcurrentLfuCache::from_config(config).unwrap();
    for i in 0..100 {
        background.insert(i, i);
    }
    thread::sleep(Duration::from_millis(20));
    println!("   Background: len shortly after 100 inserts = {}", background.len());

    // Null: nothing happens until the caller asks
    let config = ConcurrentLfuCacheConfig::new(10).with_scheduler(Arc::new(NullScheduler::new()));
    let manual: ConcurrentLfuCache<u32, u32> = ConcurrentLfuCache::from_config(config).unwrap();
    for i in 0..100 {
        manual.insert(i, i);
    }
    println!("   Null: len before run_pending_tasks = {}", manual.len());
    manual.run_pending_tasks();
    println!("   Null: len after run_pending_tasks = {}", manual.len());
}

/// One factory call per key, however many threads ask at once
fn single_flight_loading() {
    println!("5. Single-Flight Loading");
    println!("   ----------------------");

    let inner: ConcurrentLfuCache<u32, AtomicFactory<String>> =
        ConcurrentLfuCache::new(100).unwrap();
    let cache = Arc::new(AtomicFactoryCache::new(inner));
    let loads = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            thread::spawn(move || {
                cache.get_or_add(42, |key| {
                    loads.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    format!("loaded {}", key)
                })
            })
        })
        .collect();

    for handle in handles {
        let value = handle.join().expect("Thread panicked");
        assert_eq!(value, "loaded 42");
    }
    println!(
        "   8 threads asked for key 42, factory ran {} time(s)",
        loads.load(Ordering::SeqCst)
    );
}

/// Compare throughput across different stripe counts
fn throughput_comparison() {
    println!("6. Throughput Comparison (8 threads, 10K ops each)");
    println!("   -------------------------------------------------");

    let ops_per_thread = 10_000;
    let num_threads = 8;

    for stripes in [1, 4, 8, 16, 32] {
        let config = ConcurrentLfuCacheConfig::new(10_000).with_concurrency_level(stripes);
        let cache: Arc<ConcurrentLfuCache<usize, usize>> =
            Arc::new(ConcurrentLfuCache::from_config(config).unwrap());

        let start = Instant::now();

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let offset = t * ops_per_thread;
                    for i in 0..ops_per_thread {
                        let key = offset + i;
                        cache.insert(key, key);
                        cache.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let elapsed = start.elapsed();
        let total_ops = num_threads * ops_per_thread * 2;
        let ops_per_sec = (total_ops as f64 / elapsed.as_secs_f64()) as u64;

        println!(
            "   {:2} stripes: {:>7.2?} ({:>10} ops/sec)",
            stripes, elapsed, ops_per_sec
        );
    }

    println!();
    println!("   More stripes reduce contention on the table and read buffers.");
    println!("   The eviction policy itself is updated by one drainer at a time.");
}
