//! The capability every cache and cache decorator shares.
//!
//! Decorators such as [`AtomicFactoryCache`](crate::AtomicFactoryCache) wrap
//! any `Cache` and implement `Cache` themselves, so wrappers compose in any
//! order.

/// Operations common to caches and their decorators.
///
/// All methods take `&self`; implementations are expected to be internally
/// synchronized.
pub trait Cache<K, V> {
    /// Returns a copy of the value for `key`, if present and live.
    fn get(&self, key: &K) -> Option<V>;

    /// Returns the value for `key`, computing it with `factory` on a miss.
    fn get_or_add<F>(&self, key: K, factory: F) -> V
    where
        F: FnOnce(&K) -> V;

    /// Like [`get_or_add`](Self::get_or_add) with a fallible factory. An
    /// error is returned and nothing is cached.
    fn try_get_or_add<F, E>(&self, key: K, factory: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>;

    /// Inserts or replaces the value for `key`, returning the previous one.
    fn insert(&self, key: K, value: V) -> Option<V>;

    /// Inserts only if `key` is absent.
    fn try_add(&self, key: K, value: V) -> bool;

    /// Replaces only if `key` is present.
    fn try_update(&self, key: &K, value: V) -> bool;

    /// Removes `key`, returning its value.
    fn remove(&self, key: &K) -> Option<V>;

    /// Whether `key` maps to a live entry. Does not count as a read.
    fn contains_key(&self, key: &K) -> bool;

    /// Number of entries. May briefly include entries awaiting eviction.
    fn len(&self) -> usize;

    /// `true` when [`len`](Self::len) is zero.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry, reporting each as removed.
    fn clear(&self);

    /// Weakly consistent snapshot of the keys.
    fn keys(&self) -> Vec<K>;

    /// Maximum number of resident entries.
    fn capacity(&self) -> usize;
}
