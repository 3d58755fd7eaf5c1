//! Concurrent W-TinyLFU Cache Implementation
//!
//! A thread-safe cache whose hot path never takes a cache-wide lock. Lookups
//! and writes touch one table stripe and append an event to a buffer; the
//! eviction policy is updated later, in batches, by whichever thread wins the
//! maintenance section.
//!
//! # How It Works
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │                         ConcurrentLfuCache                             │
//! │                                                                        │
//! │  get/insert ──▶ Table stripe (RwLock) ──▶ read / write event buffer    │
//! │                                                  │                     │
//! │                        watermark, tick, full ────┤                     │
//! │                                                  ▼                     │
//! │                     ┌──────────────────────────────────────────┐       │
//! │                     │ maintenance section (Mutex, try_lock)    │       │
//! │                     │  replay writes, then reads               │       │
//! │                     │  evict down to capacity                  │       │
//! │                     │  sweep expired entries                   │       │
//! │                     └──────────────────────────────────────────┘       │
//! │                                                  │                     │
//! │                           removal notifications ◀┘ (after unlock)      │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Drain Scheduling
//!
//! An atomic drain status makes sure at most one drain task is queued at a
//! time. The task is handed to the configured [`Scheduler`]: inline on the
//! calling thread, on a background worker, or nowhere at all. A task that
//! finds the section busy leaves the status as required and returns; the
//! drain in flight or the next trigger picks up its events.
//!
//! Write events are never dropped. A writer that finds the write buffer full
//! drains it itself before retrying. Read events are dropped when their
//! stripe is full, which only costs recency accuracy.
//!
//! ## Consistency
//!
//! The table is always authoritative: `insert` followed by `get` on the same
//! thread returns the inserted value, whatever the state of the buffers. The
//! entry count may exceed capacity until the next drain settles.
//!
//! # Thread Safety
//!
//! `ConcurrentLfuCache` is `Send + Sync` and can be shared via `Arc`.
//!
//! # Example
//!
//! ```rust
//! use concurrent_lfu::ConcurrentLfuCache;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let cache = Arc::new(ConcurrentLfuCache::new(1_000).unwrap());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let cache = Arc::clone(&cache);
//!         thread::spawn(move || {
//!             for i in 0..500 {
//!                 let key = format!("key-{}-{}", t, i);
//!                 cache.insert(key.clone(), i);
//!                 assert_eq!(cache.get(&key), Some(i));
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! cache.run_pending_tasks();
//! assert!(cache.len() <= 1_000);
//! ```

use super::table::{Insertion, Table};
use crate::buffer::{ReadStatus, StripedReadBuffer, WriteBuffer};
use crate::config::ConcurrentLfuCacheConfig;
use crate::entry::Node;
use crate::error::ConfigError;
use crate::expiry::{is_expired, to_nanos, Clock, ExpiryPolicy, NEVER};
use crate::metrics::{CacheMetrics, CoreCacheMetrics, LfuCacheMetrics};
use crate::notification::{self, RemovalCause, RemovalListener};
use crate::policy::{Policy, Victim, WriteEvent};
use crate::scheduler::Scheduler;
use crate::traits::Cache;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;

const IDLE: u8 = 0;
const REQUIRED: u8 = 1;
const PROCESSING_TO_IDLE: u8 = 2;
const PROCESSING_TO_REQUIRED: u8 = 3;

/// Buffer passes a scheduled drain makes before releasing the section.
const MAX_DRAIN_PASSES: usize = 4;

/// Buffer passes a caller-forced drain makes.
const MAX_FORCED_PASSES: usize = 64;

/// A thread-safe W-TinyLFU cache with buffered policy maintenance.
pub struct ConcurrentLfuCache<K, V, S = DefaultHashBuilder> {
    inner: Arc<Inner<K, V, S>>,
}

struct Inner<K, V, S> {
    table: Table<K, V, S>,
    read_buffer: StripedReadBuffer<Arc<Node<K, V>>>,
    write_buffer: WriteBuffer<WriteEvent<K, V>>,
    policy: Mutex<Policy<K, V>>,
    drain_status: AtomicU8,
    capacity: AtomicUsize,
    scheduler: Arc<dyn Scheduler>,
    expiry: Option<ExpiryPolicy<K, V>>,
    clock: Arc<dyn Clock>,
    listener: Option<RemovalListener<K, V>>,
    metrics: Option<Arc<LfuCacheMetrics>>,
    /// Scheduled tick period in clock nanoseconds.
    maintenance_interval: u64,
    next_maintenance: AtomicU64,
}

impl<K, V> ConcurrentLfuCache<K, V, DefaultHashBuilder>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache holding at most `capacity` entries, with defaults for
    /// everything else.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::init(ConcurrentLfuCacheConfig::new(capacity), None)
    }

    /// Creates a cache from a configuration.
    pub fn from_config(config: ConcurrentLfuCacheConfig<K, V>) -> Result<Self, ConfigError> {
        Self::init(config, None)
    }

    /// Creates a cache from a configuration and an optional hasher.
    pub fn init(
        config: ConcurrentLfuCacheConfig<K, V>,
        hasher: Option<DefaultHashBuilder>,
    ) -> Result<Self, ConfigError> {
        Self::init_with_hasher(config, hasher.unwrap_or_default())
    }
}

impl<K, V, S> ConcurrentLfuCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    /// Creates a cache from a configuration and a custom hasher.
    ///
    /// The configuration is validated before anything is allocated.
    pub fn init_with_hasher(
        config: ConcurrentLfuCacheConfig<K, V>,
        hash_builder: S,
    ) -> Result<Self, ConfigError> {
        let (partition, expiry) = config.validate()?;
        let stripes = config.concurrency_level();
        let metrics = config
            .metrics_enabled()
            .then(|| Arc::new(LfuCacheMetrics::new()));
        let clock = Arc::clone(config.clock());
        let maintenance_interval = to_nanos(config.maintenance_interval());
        let now = to_nanos(clock.now());

        log::debug!(
            "creating cache: capacity={} window={} protected={} stripes={} expiry={:?}",
            partition.capacity(),
            partition.window(),
            partition.protected(),
            stripes,
            expiry
        );

        let inner = Inner {
            table: Table::new(stripes, partition.capacity(), hash_builder),
            read_buffer: StripedReadBuffer::new(stripes),
            write_buffer: WriteBuffer::new(),
            policy: Mutex::new(Policy::new(partition, metrics.clone())),
            drain_status: AtomicU8::new(IDLE),
            capacity: AtomicUsize::new(partition.capacity()),
            scheduler: Arc::clone(config.scheduler()),
            expiry,
            clock,
            listener: config.removal_listener().cloned(),
            metrics,
            maintenance_interval,
            next_maintenance: AtomicU64::new(now.saturating_add(maintenance_interval)),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Returns the configured maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.capacity.load(Ordering::Acquire)
    }

    /// Returns the number of table stripes.
    pub fn concurrency_level(&self) -> usize {
        self.inner.table.stripe_count()
    }

    /// Returns the number of mapped entries, including expired entries not
    /// yet swept.
    pub fn len(&self) -> usize {
        self.inner.table.len()
    }

    /// Returns `true` if nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.inner.table.is_empty()
    }

    /// Retrieves a copy of the value for `key`.
    ///
    /// An expired entry is a miss and is detached on the spot.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lookup(key).map(|node| node.value())
    }

    /// Calls `f` with a reference to the value for `key`, without cloning it.
    pub fn get_with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&V) -> R,
    {
        self.inner.lookup(key).map(|node| node.with_value(f))
    }

    /// Returns `true` if `key` maps to a live entry. Does not count as a read.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let inner = &self.inner;
        let hash = inner.table.hash(key);
        let now = inner.now();
        inner
            .table
            .get(hash, key)
            .is_some_and(|node| !is_expired(node.expire_at(), now))
    }

    /// Returns the value for `key`, computing and inserting it on a miss.
    ///
    /// Two threads missing on the same key may both run `factory`; the first
    /// insertion wins and both callers get its value. Wrap the cache in an
    /// [`AtomicFactoryCache`](crate::AtomicFactoryCache) to run it once.
    pub fn get_or_add<F>(&self, key: K, factory: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(node) = self.inner.lookup(&key) {
            return node.value();
        }
        let value = factory(&key);
        self.inner.add_or_keep(key, value)
    }

    /// Like [`get_or_add`](Self::get_or_add) with a fallible factory. An
    /// error is returned to the caller and nothing is cached.
    pub fn try_get_or_add<F, E>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(node) = self.inner.lookup(&key) {
            return Ok(node.value());
        }
        let value = factory(&key)?;
        Ok(self.inner.add_or_keep(key, value))
    }

    /// Inserts or replaces the value for `key`, returning the previous live
    /// value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let inner = &self.inner;
        let hash = inner.table.hash(&key);
        let now = inner.now();
        let insertion = inner.table.insert(
            hash,
            key,
            value,
            true,
            |node| !is_expired(node.expire_at(), now),
            |key, value| inner.new_node(key, value, hash, now),
        );
        match insertion {
            Insertion::Inserted { node, displaced } => {
                inner.on_inserted(node, displaced);
                None
            }
            Insertion::Present { node, value: old } => {
                inner.on_replaced(&node, &old, now);
                Some(old)
            }
        }
    }

    /// Inserts `value` only if `key` has no live entry. Returns whether it
    /// was inserted.
    pub fn try_add(&self, key: K, value: V) -> bool {
        let inner = &self.inner;
        let hash = inner.table.hash(&key);
        let now = inner.now();
        let insertion = inner.table.insert(
            hash,
            key,
            value,
            false,
            |node| !is_expired(node.expire_at(), now),
            |key, value| inner.new_node(key, value, hash, now),
        );
        match insertion {
            Insertion::Inserted { node, displaced } => {
                inner.on_inserted(node, displaced);
                true
            }
            Insertion::Present { .. } => false,
        }
    }

    /// Replaces the value of a live entry. Returns `false` when `key` has no
    /// live entry, in which case nothing is inserted.
    pub fn try_update<Q>(&self, key: &Q, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let inner = &self.inner;
        let hash = inner.table.hash(key);
        let now = inner.now();
        match inner
            .table
            .replace(hash, key, value, |node| !is_expired(node.expire_at(), now))
        {
            Some((node, old)) => {
                inner.on_replaced(&node, &old, now);
                true
            }
            None => false,
        }
    }

    /// Removes `key`, returning its value if the entry was live.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let inner = &self.inner;
        let hash = inner.table.hash(key);
        let node = inner.table.remove(hash, key)?;
        node.mark_removed();
        let expired = is_expired(node.expire_at(), inner.now());
        let value = node.value();

        if expired {
            inner.record(LfuCacheMetrics::record_expiration);
            inner.notify_removal(&node, RemovalCause::Expired);
        } else {
            inner.notify_removal(&node, RemovalCause::Removed);
        }
        inner.after_write(WriteEvent::Remove(node));

        (!expired).then_some(value)
    }

    /// Removes every entry. Each one is reported as removed.
    pub fn clear(&self) {
        let inner = &self.inner;
        let mut policy = inner.policy.lock();
        for _ in 0..MAX_FORCED_PASSES {
            if inner.apply_buffers(&mut policy) == 0 {
                break;
            }
        }
        let nodes = inner.table.drain();
        for node in &nodes {
            node.mark_removed();
        }
        // anything still linked was drained above or already removed
        policy.clear();
        drop(policy);

        log::debug!("cleared {} entries", nodes.len());
        for node in &nodes {
            inner.notify_removal(node, RemovalCause::Removed);
        }
    }

    /// Keys of live entries. Weakly consistent: entries inserted or removed
    /// during the call may or may not appear.
    pub fn keys(&self) -> Vec<K> {
        let now = self.inner.now();
        self.inner
            .table
            .keys(|node| !is_expired(node.expire_at(), now))
    }

    /// Changes the capacity and repartitions the segments.
    ///
    /// Shrinking evicts down to the new capacity before returning. Growing
    /// evicts nothing.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), ConfigError> {
        let inner = &self.inner;
        let mut policy = inner.policy.lock();
        let partition = policy.partition().resize(capacity)?;
        let previous = inner.capacity.swap(capacity, Ordering::AcqRel);
        policy.resize(partition);

        let mut victims = Vec::new();
        policy.evict(&mut victims);
        let removed = inner.detach_victims(victims);
        drop(policy);

        log::debug!(
            "capacity changed from {} to {}, evicted {}",
            previous,
            capacity,
            removed.len()
        );
        inner.deliver(removed);
        Ok(())
    }

    /// Drains every buffer and runs eviction and expiry now, on the calling
    /// thread, waiting for any drain in progress.
    pub fn run_pending_tasks(&self) {
        let policy = self.inner.policy.lock();
        self.inner.maintain_locked(policy, MAX_FORCED_PASSES);
    }

    /// Returns the sketch's frequency estimate for `key`, at most 15.
    ///
    /// Buffered reads are not counted until the next drain. Returns `None`
    /// while a drain holds the policy.
    pub fn frequency<Q>(&self, key: &Q) -> Option<u8>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.inner.table.hash(key);
        self.inner.policy.try_lock().map(|policy| policy.frequency(hash))
    }

    /// The scheduler that runs maintenance.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.inner.scheduler
    }

    /// The expiry policy, if one was configured.
    pub fn expiry_policy(&self) -> Option<&ExpiryPolicy<K, V>> {
        self.inner.expiry.as_ref()
    }

    /// A copy of the common counters, if metrics are enabled.
    pub fn stats(&self) -> Option<CoreCacheMetrics> {
        self.inner.metrics.as_ref().map(|m| m.snapshot())
    }

    /// The live counters, if metrics are enabled.
    pub fn lfu_metrics(&self) -> Option<&LfuCacheMetrics> {
        self.inner.metrics.as_deref()
    }
}

impl<K, V, S> Inner<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    #[inline]
    fn now(&self) -> u64 {
        to_nanos(self.clock.now())
    }

    #[inline]
    fn record(&self, f: impl FnOnce(&LfuCacheMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    fn new_node(&self, key: K, value: V, hash: u64, now: u64) -> Arc<Node<K, V>> {
        let deadline = self
            .expiry
            .as_ref()
            .map_or(NEVER, |expiry| expiry.on_create(&key, &value, now));
        Arc::new(Node::new(key, value, hash, deadline))
    }

    fn lookup<Q>(self: &Arc<Self>, key: &Q) -> Option<Arc<Node<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.table.hash(key);
        let now = self.now();
        let Some(node) = self.table.get(hash, key) else {
            self.record(LfuCacheMetrics::record_miss);
            self.maybe_tick(now);
            return None;
        };

        if is_expired(node.expire_at(), now) {
            self.record(LfuCacheMetrics::record_miss);
            self.expire_node(&node);
            return None;
        }

        if let Some(expiry) = &self.expiry {
            if !matches!(expiry, ExpiryPolicy::AfterWrite(_)) {
                let current = node.expire_at();
                let deadline = node.with_value(|v| expiry.on_read(node.key(), v, now, current));
                node.set_expire_at(deadline);
            }
        }

        self.record(LfuCacheMetrics::record_hit);
        self.after_read(&node, now);
        Some(node)
    }

    /// Inserts for `get_or_add`. A racing insert that got there first wins.
    fn add_or_keep(self: &Arc<Self>, key: K, value: V) -> V {
        let hash = self.table.hash(&key);
        let now = self.now();
        let insertion = self.table.insert(
            hash,
            key,
            value,
            false,
            |node| !is_expired(node.expire_at(), now),
            |key, value| self.new_node(key, value, hash, now),
        );
        match insertion {
            Insertion::Inserted { node, displaced } => {
                let value = node.value();
                self.on_inserted(node, displaced);
                value
            }
            Insertion::Present { node, .. } => {
                self.after_read(&node, now);
                node.value()
            }
        }
    }

    fn on_inserted(self: &Arc<Self>, node: Arc<Node<K, V>>, displaced: Option<Arc<Node<K, V>>>) {
        if let Some(old) = displaced {
            old.mark_removed();
            self.record(LfuCacheMetrics::record_expiration);
            self.notify_removal(&old, RemovalCause::Expired);
            self.after_write(WriteEvent::Remove(old));
        }
        self.after_write(WriteEvent::Add(node));
    }

    fn on_replaced(self: &Arc<Self>, node: &Arc<Node<K, V>>, old: &V, now: u64) {
        if let Some(expiry) = &self.expiry {
            let current = node.expire_at();
            let deadline = node.with_value(|v| expiry.on_update(node.key(), v, now, current));
            node.set_expire_at(deadline);
        }
        self.record(LfuCacheMetrics::record_update);
        if let Some(listener) = &self.listener {
            notification::notify(listener, node.key(), old, RemovalCause::Replaced);
        }
        self.after_write(WriteEvent::Update(Arc::clone(node)));
    }

    /// Detaches a node found expired on the hot path.
    fn expire_node(self: &Arc<Self>, node: &Arc<Node<K, V>>) {
        if self.table.remove_if_same(node) {
            node.mark_removed();
            self.record(LfuCacheMetrics::record_expiration);
            self.notify_removal(node, RemovalCause::Expired);
            self.after_write(WriteEvent::Remove(Arc::clone(node)));
        }
    }

    fn notify_removal(&self, node: &Node<K, V>, cause: RemovalCause) {
        if let Some(listener) = &self.listener {
            node.with_value(|value| notification::notify(listener, node.key(), value, cause));
        }
    }

    fn after_read(self: &Arc<Self>, node: &Arc<Node<K, V>>, now: u64) {
        match self.read_buffer.push(node.hash(), Arc::clone(node)) {
            ReadStatus::Recorded => self.maybe_tick(now),
            ReadStatus::Full => self.schedule_drain(),
            ReadStatus::Dropped => {
                self.record(LfuCacheMetrics::record_dropped_read);
                self.schedule_drain();
            }
        }
    }

    fn after_write(self: &Arc<Self>, event: WriteEvent<K, V>) {
        let mut pending = event;
        while let Err(rejected) = self.write_buffer.try_push(pending) {
            pending = rejected;
            // the buffer is full: drain it here rather than lose the event
            match self.policy.try_lock() {
                Some(policy) => self.maintain_locked(policy, MAX_DRAIN_PASSES),
                None => thread::yield_now(),
            }
        }
        self.schedule_drain();
    }

    #[inline]
    fn maybe_tick(self: &Arc<Self>, now: u64) {
        if now >= self.next_maintenance.load(Ordering::Relaxed) {
            self.schedule_drain();
        }
    }

    /// Queues a drain unless one is already queued or running.
    fn schedule_drain(self: &Arc<Self>) {
        let mut status = self.drain_status.load(Ordering::Acquire);
        loop {
            let next = match status {
                IDLE | REQUIRED => PROCESSING_TO_IDLE,
                PROCESSING_TO_IDLE => PROCESSING_TO_REQUIRED,
                _ => return,
            };
            match self.drain_status.compare_exchange_weak(
                status,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) if next == PROCESSING_TO_REQUIRED => return,
                Ok(_) => break,
                Err(actual) => status = actual,
            }
        }

        let weak = Arc::downgrade(self);
        let accepted = self.scheduler.run(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.run_scheduled_drain();
            }
        }));
        if !accepted {
            self.drain_status.store(REQUIRED, Ordering::Release);
        }
    }

    fn run_scheduled_drain(self: &Arc<Self>) {
        // busy: the request stays pending for the next caller
        let Some(policy) = self.policy.try_lock() else {
            self.drain_status.store(REQUIRED, Ordering::Release);
            return;
        };
        self.maintain_locked(policy, MAX_DRAIN_PASSES);
        // events that arrived mid-drain have no caller left to trigger them
        if self.scheduler.is_background() && self.drain_status.load(Ordering::Acquire) == REQUIRED
        {
            self.schedule_drain();
        }
    }

    /// Replays one batch from each buffer. Writes go first so that reads of
    /// nodes added in the same batch find them linked.
    fn apply_buffers(&self, policy: &mut Policy<K, V>) -> usize {
        let writes = self.write_buffer.drain_into(|event| policy.on_write(event));
        let reads = self.read_buffer.drain_into(|node| policy.on_read(&node));
        writes + reads
    }

    /// Runs a drain while holding the maintenance section, then releases it
    /// and delivers notifications.
    fn maintain_locked(&self, mut policy: MutexGuard<'_, Policy<K, V>>, passes: usize) {
        self.drain_status
            .store(PROCESSING_TO_IDLE, Ordering::Release);
        let now = self.now();

        let mut victims = Vec::new();
        let mut applied = 0;
        for _ in 0..passes {
            let batch = self.apply_buffers(&mut policy);
            policy.evict(&mut victims);
            applied += batch;
            if batch == 0 {
                break;
            }
        }
        if self.expiry.is_some() {
            policy.expire(now, &mut victims);
        }
        let removed = self.detach_victims(victims);

        self.next_maintenance
            .store(now.saturating_add(self.maintenance_interval), Ordering::Relaxed);
        let settled = self.write_buffer.is_empty()
            && self
                .drain_status
                .compare_exchange(
                    PROCESSING_TO_IDLE,
                    IDLE,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok();
        if !settled {
            self.drain_status.store(REQUIRED, Ordering::Release);
        }
        drop(policy);

        if !removed.is_empty() {
            log::debug!(
                "drain applied {} events, removed {} entries",
                applied,
                removed.len()
            );
        }
        self.deliver(removed);
    }

    /// Removes unlinked victims from the table. Only victims still mapped by
    /// their key are kept for notification; any other removal was already
    /// reported by whoever performed it.
    fn detach_victims(&self, victims: Vec<Victim<K, V>>) -> Vec<Victim<K, V>> {
        let mut removed = Vec::with_capacity(victims.len());
        for (node, cause) in victims {
            if !self.table.remove_if_same(&node) {
                continue;
            }
            node.mark_removed();
            match cause {
                RemovalCause::Expired => self.record(LfuCacheMetrics::record_expiration),
                _ => self.record(LfuCacheMetrics::record_eviction),
            }
            removed.push((node, cause));
        }
        removed
    }

    fn deliver(&self, removed: Vec<Victim<K, V>>) {
        if self.listener.is_none() {
            return;
        }
        for (node, cause) in &removed {
            self.notify_removal(node, *cause);
        }
    }
}

impl<K, V, S> Cache<K, V> for ConcurrentLfuCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        ConcurrentLfuCache::get(self, key)
    }

    fn get_or_add<F>(&self, key: K, factory: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        ConcurrentLfuCache::get_or_add(self, key, factory)
    }

    fn try_get_or_add<F, E>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        ConcurrentLfuCache::try_get_or_add(self, key, factory)
    }

    fn insert(&self, key: K, value: V) -> Option<V> {
        ConcurrentLfuCache::insert(self, key, value)
    }

    fn try_add(&self, key: K, value: V) -> bool {
        ConcurrentLfuCache::try_add(self, key, value)
    }

    fn try_update(&self, key: &K, value: V) -> bool {
        ConcurrentLfuCache::try_update(self, key, value)
    }

    fn remove(&self, key: &K) -> Option<V> {
        ConcurrentLfuCache::remove(self, key)
    }

    fn contains_key(&self, key: &K) -> bool {
        ConcurrentLfuCache::contains_key(self, key)
    }

    fn len(&self) -> usize {
        ConcurrentLfuCache::len(self)
    }

    fn clear(&self) {
        ConcurrentLfuCache::clear(self)
    }

    fn keys(&self) -> Vec<K> {
        ConcurrentLfuCache::keys(self)
    }

    fn capacity(&self) -> usize {
        ConcurrentLfuCache::capacity(self)
    }
}

impl<K, V, S> CacheMetrics for ConcurrentLfuCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self
            .inner
            .metrics
            .as_ref()
            .map(|m| m.to_btreemap())
            .unwrap_or_default();
        metrics.insert("capacity".to_string(), self.capacity() as f64);
        metrics.insert("entries".to_string(), self.len() as f64);
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "ConcurrentLFU"
    }
}

impl<K, V, S> core::fmt::Debug for ConcurrentLfuCache<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = &self.inner;
        f.debug_struct("ConcurrentLfuCache")
            .field("capacity", &inner.capacity.load(Ordering::Relaxed))
            .field("stripes", &inner.read_buffer.stripe_count())
            .field("pending_reads", &inner.read_buffer.len())
            .field("pending_writes", &inner.write_buffer.len())
            .field("scheduler", &inner.scheduler)
            .field("expiry", &inner.expiry)
            .finish()
    }
}
