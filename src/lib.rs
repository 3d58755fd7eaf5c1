#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Admission Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          W-TinyLFU entry lifecycle                          │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                                                                             │
//! │   insert ──▶ ┌────────┐  overflow  ┌───────────┐  read   ┌───────────┐      │
//! │              │ Window │ ─────────▶ │ Probation │ ──────▶ │ Protected │      │
//! │              │  ~1%   │  (admit?)  │           │ ◀────── │   ~80%    │      │
//! │              └────────┘            └───────────┘ demote  └───────────┘      │
//! │                                          │                                  │
//! │                                          ▼                                  │
//! │                                       evicted                               │
//! │                                                                             │
//! │   Frequency sketch: 4-bit count-min counters, halved every 10 x capacity    │
//! │   increments.                                                               │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Reference
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConcurrentLfuCache`] | Thread-safe W-TinyLFU cache |
//! | [`AtomicFactoryCache`] | Decorator running one factory per key at a time |
//! | [`ScopedCache`] | Decorator handing out reference-counted value lifetimes |
//! | [`ConcurrentLfuCacheConfig`] | Builder-style construction options |
//! | [`CapacityPartition`] | Window / probation / protected sizing |
//!
//! ## Code Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use concurrent_lfu::ConcurrentLfuCache;
//!
//! let cache = ConcurrentLfuCache::new(2).unwrap();
//! cache.insert("rare", 1);
//! for _ in 0..10 {
//!     cache.get(&"popular");
//! }
//! cache.insert("popular", 2);
//! for _ in 0..10 {
//!     cache.get(&"popular");
//! }
//! cache.insert("new", 3);
//! cache.run_pending_tasks();
//!
//! assert_eq!(cache.len(), 2);
//! assert!(cache.contains_key(&"popular"));
//! ```
//!
//! ### Expiry
//!
//! ```rust
//! use concurrent_lfu::{ConcurrentLfuCache, ConcurrentLfuCacheConfig, ManualClock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(ManualClock::new());
//! let config = ConcurrentLfuCacheConfig::new(100)
//!     .with_expire_after_write(Duration::from_secs(30))
//!     .with_clock(clock.clone());
//! let cache = ConcurrentLfuCache::from_config(config).unwrap();
//!
//! cache.insert("session", 1);
//! clock.advance(Duration::from_secs(31));
//! assert_eq!(cache.get(&"session"), None);
//! ```
//!
//! ### Removal Notifications
//!
//! ```rust
//! use concurrent_lfu::{ConcurrentLfuCache, ConcurrentLfuCacheConfig, RemovalCause};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let evicted = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&evicted);
//! let config = ConcurrentLfuCacheConfig::new(10).with_removal_listener(
//!     move |_key: &u32, _value: &u32, cause: RemovalCause| {
//!         if cause.was_evicted() {
//!             counter.fetch_add(1, Ordering::Relaxed);
//!         }
//!     },
//! );
//! let cache = ConcurrentLfuCache::from_config(config).unwrap();
//! for i in 0..100 {
//!     cache.insert(i, i);
//! }
//! cache.run_pending_tasks();
//! assert_eq!(evicted.load(Ordering::Relaxed), 90);
//! ```
//!
//! ## Modules
//!
//! - [`concurrent`]: the concurrent cache
//! - [`atomic`]: single-flight decorator
//! - [`scoped`]: reference-counted value lifetimes
//! - [`config`]: configuration and capacity partitioning
//! - [`expiry`]: clocks and expiry policies
//! - [`scheduler`]: where maintenance runs
//! - [`metrics`]: metrics collection
//! - [`sketch`]: the frequency sketch

/// Event buffers between the hot path and the maintenance section.
mod buffer;

/// Shared cache node.
mod entry;

/// Index-based arena and doubly linked lists.
///
/// Internal infrastructure for the policy's segment ordering.
mod list;

/// Eviction policy state, only touched while draining.
mod policy;

/// Segment tags and per-node policy metadata.
pub mod meta;

/// Count-Min frequency sketch with periodic halving.
pub mod sketch;

/// Time sources and expiry policies.
pub mod expiry;

/// Removal causes and listeners.
pub mod notification;

/// Maintenance schedulers.
///
/// Decides whether a drain runs on the calling thread, on a background
/// worker, or only when the caller asks for it.
pub mod scheduler;

/// Cache configuration structures.
pub mod config;

/// Configuration errors.
pub mod error;

/// Cache metrics system.
///
/// Provides counters and a common reporting interface for the cache and its
/// decorators.
pub mod metrics;

/// The capability trait shared by caches and decorators.
pub mod traits;

/// Single-flight `get_or_add` decorator.
pub mod atomic;

/// Decorator handing out reference-counted value lifetimes.
pub mod scoped;

/// Concurrent cache implementation.
///
/// Provides the thread-safe W-TinyLFU cache built on a striped table and
/// buffered policy maintenance.
pub mod concurrent;

pub use atomic::{AtomicFactory, AtomicFactoryCache};
pub use concurrent::ConcurrentLfuCache;
pub use config::{CapacityPartition, ConcurrentLfuCacheConfig};
pub use error::ConfigError;
pub use expiry::{Clock, Expiry, ExpiryPolicy, ManualClock, SystemClock};
pub use meta::Region;
pub use metrics::{CacheMetrics, CoreCacheMetrics, LfuCacheMetrics};
pub use notification::{RemovalCause, RemovalListener};
pub use scheduler::{BackgroundThreadScheduler, ForegroundScheduler, NullScheduler, Scheduler};
pub use scoped::{Lifetime, Scoped, ScopedCache};
pub use sketch::FrequencySketch;
pub use traits::Cache;
