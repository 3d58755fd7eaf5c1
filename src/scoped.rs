//! Reference-counted values that outlive their cache entry only while in use.
//!
//! A [`ScopedCache`] stores each value inside a [`Scoped`] cell. The cache
//! holds one reference to the cell and every caller reading through the
//! decorator gets a [`Lifetime`] holding another. When the entry leaves the
//! cache for any reason the removal notification releases the cache's
//! reference, and the value is dropped as soon as the last `Lifetime` goes.
//! A released cell hands out no new lifetimes, so a reader never revives a
//! value the cache has already let go.
//!
//! ```
//! use concurrent_lfu::config::ConcurrentLfuCacheConfig;
//! use concurrent_lfu::ScopedCache;
//!
//! let cache = ScopedCache::from_config(ConcurrentLfuCacheConfig::new(100)).unwrap();
//! let lifetime = cache.scoped_get_or_add(1u32, |k| format!("connection-{k}"));
//! assert!(cache.remove(&1));
//!
//! // still usable until the lifetime is dropped
//! assert_eq!(lifetime.as_str(), "connection-1");
//! assert!(cache.scoped_try_get(&1).is_none());
//! ```

use crate::concurrent::ConcurrentLfuCache;
use crate::config::ConcurrentLfuCacheConfig;
use crate::error::ConfigError;
use crate::expiry::ExpiryPolicy;
use core::fmt;
use core::hash::Hash;
use core::ops::Deref;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct Scope<T> {
    // the cache's reference plus one per live lifetime
    refs: AtomicUsize,
    released: AtomicBool,
    value: Mutex<Option<Arc<T>>>,
}

impl<T> Scope<T> {
    fn release_ref(&self) {
        if self.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            let value = self.value.lock().take();
            drop(value);
        }
    }
}

/// A value shared between a cache entry and the callers using it.
pub struct Scoped<T> {
    scope: Arc<Scope<T>>,
}

impl<T> Scoped<T> {
    /// Wraps `value`, counting the cache as its first holder.
    pub fn new(value: T) -> Self {
        Scoped {
            scope: Arc::new(Scope {
                refs: AtomicUsize::new(1),
                released: AtomicBool::new(false),
                value: Mutex::new(Some(Arc::new(value))),
            }),
        }
    }

    /// A new handle to the value, or `None` once the value has been dropped.
    pub fn try_create_lifetime(&self) -> Option<Lifetime<T>> {
        let scope = &self.scope;
        let mut refs = scope.refs.load(Ordering::Acquire);
        loop {
            if refs == 0 {
                return None;
            }
            match scope
                .refs
                .compare_exchange_weak(refs, refs + 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => refs = actual,
            }
        }

        let value = scope.value.lock().clone();
        match value {
            Some(value) => Some(Lifetime {
                value,
                scope: Arc::clone(scope),
            }),
            None => {
                scope.release_ref();
                None
            }
        }
    }

    /// Gives up the cache's reference. Only the first call has an effect;
    /// it returns `true`.
    pub fn release(&self) -> bool {
        if self.scope.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.scope.release_ref();
        true
    }

    /// Whether the cache's reference has been given up.
    pub fn is_released(&self) -> bool {
        self.scope.released.load(Ordering::Acquire)
    }

    /// Whether the value has been dropped.
    pub fn is_disposed(&self) -> bool {
        self.scope.refs.load(Ordering::Acquire) == 0
    }
}

impl<T> Clone for Scoped<T> {
    fn clone(&self) -> Self {
        Scoped {
            scope: Arc::clone(&self.scope),
        }
    }
}

impl<T> fmt::Debug for Scoped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("refs", &self.scope.refs.load(Ordering::Relaxed))
            .field("released", &self.is_released())
            .finish()
    }
}

/// Keeps a scoped value alive until dropped.
pub struct Lifetime<T> {
    value: Arc<T>,
    scope: Arc<Scope<T>>,
}

impl<T> Lifetime<T> {
    /// The value.
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for Lifetime<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Lifetime<T> {
    fn drop(&mut self) {
        self.scope.release_ref();
    }
}

impl<T: fmt::Debug> fmt::Debug for Lifetime<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lifetime").field(&self.value).finish()
    }
}

/// Cache decorator handing out [`Lifetime`]s instead of values.
pub struct ScopedCache<K, V> {
    inner: ConcurrentLfuCache<K, Scoped<V>>,
}

impl<K, V> ScopedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Builds the underlying cache, chaining a listener that releases every
    /// departing value ahead of any listener already configured.
    ///
    /// A custom expiry is rejected: it would be computed from the
    /// [`Scoped`] wrapper rather than the value itself.
    pub fn from_config(config: ConcurrentLfuCacheConfig<K, Scoped<V>>) -> Result<Self, ConfigError> {
        let (_, expiry) = config.validate()?;
        if matches!(expiry, Some(ExpiryPolicy::Custom(_))) {
            return Err(ConfigError::ScopedCustomExpiry);
        }

        let forward = config.removal_listener().cloned();
        let config = config.with_removal_listener(move |key, value: &Scoped<V>, cause| {
            value.release();
            if let Some(listener) = &forward {
                listener(key, value, cause);
            }
        });
        Ok(ScopedCache {
            inner: ConcurrentLfuCache::from_config(config)?,
        })
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &ConcurrentLfuCache<K, Scoped<V>> {
        &self.inner
    }

    /// A lifetime for the value mapped by `key`, if any.
    pub fn scoped_try_get(&self, key: &K) -> Option<Lifetime<V>> {
        self.inner.get(key)?.try_create_lifetime()
    }

    /// A lifetime for the value mapped by `key`, creating the value on a
    /// miss. Retries when the value found was released in the meantime, so
    /// `factory` may run more than once.
    pub fn scoped_get_or_add<F>(&self, key: K, mut factory: F) -> Lifetime<V>
    where
        F: FnMut(&K) -> V,
    {
        loop {
            let scoped = self
                .inner
                .get_or_add(key.clone(), |k| Scoped::new(factory(k)));
            if let Some(lifetime) = scoped.try_create_lifetime() {
                return lifetime;
            }
        }
    }

    /// Like [`scoped_get_or_add`](Self::scoped_get_or_add) with a fallible
    /// factory. An error leaves the cache unchanged.
    pub fn scoped_try_get_or_add<F, E>(&self, key: K, mut factory: F) -> Result<Lifetime<V>, E>
    where
        F: FnMut(&K) -> Result<V, E>,
    {
        loop {
            let scoped = self
                .inner
                .try_get_or_add(key.clone(), |k| factory(k).map(Scoped::new))?;
            if let Some(lifetime) = scoped.try_create_lifetime() {
                return Ok(lifetime);
            }
        }
    }

    /// Maps `key` to `value`. A replaced value is released.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, Scoped::new(value));
    }

    /// Inserts only if `key` is absent.
    pub fn try_add(&self, key: K, value: V) -> bool {
        self.inner.try_add(key, Scoped::new(value))
    }

    /// Replaces only if `key` is present. The old value is released.
    pub fn try_update(&self, key: &K, value: V) -> bool {
        self.inner.try_update(key, Scoped::new(value))
    }

    /// Removes `key`, releasing its value. Returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        self.inner.remove(key).is_some()
    }

    /// Whether `key` maps to a live entry.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` when nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Removes and releases every entry.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Weakly consistent snapshot of the keys.
    pub fn keys(&self) -> Vec<K> {
        self.inner.keys()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<K, V> fmt::Debug for ScopedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCache").finish_non_exhaustive()
    }
}
