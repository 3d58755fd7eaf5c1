//! Cache Metrics Demonstration
//!
//! Runs the same cache against a few access patterns and prints the core
//! counters alongside the admission statistics, showing how the frequency
//! filter reacts to each workload.

use concurrent_lfu::{
    config::ConcurrentLfuCacheConfig,
    metrics::CacheMetrics,
    AtomicFactory, AtomicFactoryCache, Cache, ConcurrentLfuCache,
};
use std::collections::BTreeMap;

const CAPACITY: usize = 100;
const OPERATIONS: u64 = 20_000;

fn main() {
    println!("🚀 Cache Metrics - Workload Comparison");
    println!("======================================\n");

    println!("📊 Running identical-length workloads:");
    println!("   • Capacity: {} items", CAPACITY);
    println!("   • Operations: {} lookups, loading on miss\n", OPERATIONS);

    let caches: Vec<(String, Box<dyn CacheMetrics>)> = vec![
        ("Uniform".to_string(), Box::new(run_workload(uniform))),
        ("Skewed".to_string(), Box::new(run_workload(skewed))),
        ("Hot + Scan".to_string(), Box::new(run_workload(hot_then_scan))),
        ("Single-flight".to_string(), Box::new(run_single_flight())),
    ];

    display_metrics_comparison(&caches);
    demonstrate_deterministic_ordering(&*caches[0].1);
}

/// Small deterministic generator so runs are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

/// Every key in a range ten times the capacity is equally likely
fn uniform(rng: &mut Lcg, _step: u64) -> u64 {
    rng.next() % (CAPACITY as u64 * 10)
}

/// Most lookups go to a small set of keys
fn skewed(rng: &mut Lcg, _step: u64) -> u64 {
    let r = rng.next() % 100;
    if r < 80 {
        r % 20
    } else {
        1_000 + rng.next() % 5_000
    }
}

/// A hot set for the first half, then a sequential scan mixed with it
fn hot_then_scan(rng: &mut Lcg, step: u64) -> u64 {
    if step < OPERATIONS / 2 || step % 2 == 0 {
        rng.next() % 50
    } else {
        100_000 + step
    }
}

fn run_workload(next_key: fn(&mut Lcg, u64) -> u64) -> ConcurrentLfuCache<u64, u64> {
    let cache = ConcurrentLfuCache::from_config(ConcurrentLfuCacheConfig::new(CAPACITY))
        .expect("valid configuration");
    let mut rng = Lcg(42);

    for step in 0..OPERATIONS {
        let key = next_key(&mut rng, step);
        if cache.get(&key).is_none() {
            cache.insert(key, key * 2);
        }
    }
    cache.run_pending_tasks();
    cache
}

fn run_single_flight() -> AtomicFactoryCache<u64, u64, ConcurrentLfuCache<u64, AtomicFactory<u64>>> {
    let inner = ConcurrentLfuCache::new(CAPACITY).expect("valid configuration");
    let cache = AtomicFactoryCache::new(inner);
    let mut rng = Lcg(42);

    for step in 0..OPERATIONS {
        let key = skewed(&mut rng, step);
        cache.get_or_add(key, |k| k * 2);
    }
    cache.inner().run_pending_tasks();
    cache
}

fn display_metrics_comparison(caches: &[(String, Box<dyn CacheMetrics>)]) {
    println!("📈 METRICS COMPARISON");
    println!("=====================\n");

    println!("📊 Core Performance Metrics:");
    println!(
        "{:<14} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Workload", "Requests", "Hits", "Hit Rate", "Evictions", "Entries"
    );
    println!("{}", "-".repeat(70));

    for (name, cache) in caches {
        let metrics = cache.metrics();
        println!(
            "{:<14} {:>10.0} {:>10.0} {:>9.1}% {:>10.0} {:>10.0}",
            name,
            metric(&metrics, "requests"),
            metric(&metrics, "cache_hits"),
            metric(&metrics, "hit_rate") * 100.0,
            metric(&metrics, "evictions"),
            metric(&metrics, "entries"),
        );
    }

    println!("\n🔍 Admission Filter:\n");
    for (name, cache) in caches {
        let metrics = cache.metrics();
        println!("{} ({}):", name, cache.algorithm_name());
        println!("  • Candidates admitted: {:.0}", metric(&metrics, "admissions"));
        println!(
            "  • Candidates rejected: {:.0}",
            metric(&metrics, "admission_rejections")
        );
        if let Some(rate) = metrics.get("admission_rate") {
            println!("  • Admission rate: {:.1}%", rate * 100.0);
        }
        println!();
    }
}

fn metric(metrics: &BTreeMap<String, f64>, key: &str) -> f64 {
    metrics.get(key).copied().unwrap_or(0.0)
}

fn demonstrate_deterministic_ordering(cache: &dyn CacheMetrics) {
    println!("🔢 Deterministic Metrics Ordering (BTreeMap):");
    println!("=============================================");
    println!("All metrics use BTreeMap for consistent, reproducible ordering across runs.\n");

    for (i, key) in cache.metrics().keys().enumerate() {
        println!("  {}. {}", i + 1, key);
    }
}
