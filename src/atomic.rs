//! Single-flight value creation.
//!
//! [`AtomicFactoryCache`] wraps any [`Cache`] whose values are
//! [`AtomicFactory`] cells. `get_or_add` first maps the key to an empty cell,
//! using the inner cache's own (possibly racy) `get_or_add`, and then
//! initializes the cell through `once_cell`. Every caller that lands on the
//! same cell waits for the one running factory and observes its value.
//!
//! ```
//! use concurrent_lfu::{AtomicFactory, AtomicFactoryCache, Cache, ConcurrentLfuCache};
//!
//! let inner: ConcurrentLfuCache<u32, AtomicFactory<String>> =
//!     ConcurrentLfuCache::new(100).unwrap();
//! let cache = AtomicFactoryCache::new(inner);
//!
//! let value = cache.get_or_add(7, |k| format!("value-{k}"));
//! assert_eq!(value, "value-7");
//! assert_eq!(cache.get(&7).as_deref(), Some("value-7"));
//! ```

use crate::metrics::CacheMetrics;
use crate::traits::Cache;
use core::fmt;
use core::marker::PhantomData;
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A shared, write-once value slot.
pub struct AtomicFactory<V> {
    cell: Arc<OnceCell<V>>,
}

impl<V> AtomicFactory<V> {
    /// An empty slot.
    pub fn new() -> Self {
        AtomicFactory {
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// A slot that already holds `value`.
    pub fn with_value(value: V) -> Self {
        AtomicFactory {
            cell: Arc::new(OnceCell::with_value(value)),
        }
    }

    /// The value, once initialized.
    pub fn get(&self) -> Option<&V> {
        self.cell.get()
    }

    /// Whether a factory has already produced the value.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<V> Default for AtomicFactory<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for AtomicFactory<V> {
    fn clone(&self) -> Self {
        AtomicFactory {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for AtomicFactory<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicFactory").field(&self.cell.get()).finish()
    }
}

/// Decorator running at most one factory per key at a time.
pub struct AtomicFactoryCache<K, V, C> {
    inner: C,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V, C> AtomicFactoryCache<K, V, C>
where
    C: Cache<K, AtomicFactory<V>>,
{
    /// Wraps `inner`.
    pub fn new(inner: C) -> Self {
        AtomicFactoryCache {
            inner,
            _marker: PhantomData,
        }
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwraps the decorator.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Drops `cell` if it is still the key's slot and still empty. Another
    /// thread can slip a fresh slot in between the check and the removal, so
    /// this is best effort; an empty slot left behind only costs capacity.
    fn discard_empty(&self, key: &K, cell: &AtomicFactory<V>) {
        let still_empty = self
            .inner
            .get(key)
            .is_some_and(|current| current.ptr_eq(cell) && !current.is_initialized());
        if still_empty {
            self.inner.remove(key);
        }
    }
}

impl<K, V, C> Cache<K, V> for AtomicFactoryCache<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Cache<K, AtomicFactory<V>>,
{
    fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).and_then(|cell| cell.get().cloned())
    }

    fn get_or_add<F>(&self, key: K, factory: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        let cell = self.inner.get_or_add(key.clone(), |_| AtomicFactory::new());
        cell.cell.get_or_init(|| factory(&key)).clone()
    }

    fn try_get_or_add<F, E>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        let cell = self.inner.get_or_add(key.clone(), |_| AtomicFactory::new());
        match cell.cell.get_or_try_init(|| factory(&key)) {
            Ok(value) => Ok(value.clone()),
            Err(err) => {
                self.discard_empty(&key, &cell);
                Err(err)
            }
        }
    }

    fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner
            .insert(key, AtomicFactory::with_value(value))
            .and_then(|old| old.get().cloned())
    }

    fn try_add(&self, key: K, value: V) -> bool {
        if self
            .inner
            .try_add(key.clone(), AtomicFactory::with_value(value.clone()))
        {
            return true;
        }
        // an empty slot means a factory is pending or failed; fill it
        match self.inner.get(&key) {
            Some(cell) => cell.cell.set(value).is_ok(),
            None => false,
        }
    }

    fn try_update(&self, key: &K, value: V) -> bool {
        self.contains_key(key)
            && self
                .inner
                .try_update(key, AtomicFactory::with_value(value))
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).and_then(|cell| cell.get().cloned())
    }

    fn contains_key(&self, key: &K) -> bool {
        self.inner
            .get(key)
            .is_some_and(|cell| cell.is_initialized())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.inner.keys()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<K, V, C: CacheMetrics> CacheMetrics for AtomicFactoryCache<K, V, C> {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.inner.metrics()
    }

    fn algorithm_name(&self) -> &'static str {
        self.inner.algorithm_name()
    }
}

impl<K, V, C: fmt::Debug> fmt::Debug for AtomicFactoryCache<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicFactoryCache")
            .field("inner", &self.inner)
            .finish()
    }
}
