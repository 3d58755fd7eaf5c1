//! Concurrent Cache Implementation
//!
//! This module holds the thread-safe W-TinyLFU cache and the striped table it
//! is built on.
//!
//! # Architecture
//!
//! The cache separates the data from the policy:
//! - The key space is partitioned across table stripes by hash, each
//!   protected by its own `parking_lot::RwLock`. Lookups only take a stripe
//!   read lock.
//! - Reads and writes are recorded as events in striped buffers instead of
//!   updating the eviction policy directly.
//! - A single drainer at a time replays those events into the policy under
//!   a `parking_lot::Mutex` that the hot path only ever `try_lock`s.
//!
//! ## Why Not Lock the Policy on Every Access?
//!
//! Frequency and recency bookkeeping needs mutable access even for reads.
//! Locking it on every `get` would serialize all threads on one lock. With
//! buffering, contention moves into the comparatively rare drain, and a
//! thread that loses the race for it just carries on.
//!
//! # Available Concurrent Caches
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConcurrentLfuCache`] | Thread-safe W-TinyLFU cache with buffered maintenance |
//!
//! # Performance Characteristics
//!
//! - **Read/Write Latency**: O(1) average, plus an occasional inline drain
//!   with the default scheduler
//! - **Concurrency**: readers of different stripes never contend
//! - **Memory Overhead**: one lock and one read buffer per stripe
//!
//! # Default Stripe Count
//!
//! By default the stripe count is the available parallelism clamped to
//! `4..=64`. Override it with
//! [`with_concurrency_level`](crate::config::ConcurrentLfuCacheConfig::with_concurrency_level).

mod lfu;
mod table;

pub use self::lfu::ConcurrentLfuCache;
