//! Striped key → node table.
//!
//! The key space is split across stripes by hash, each behind its own
//! `parking_lot::RwLock`. Lookups take a stripe read lock just long enough
//! to clone the node's `Arc`; inserts and removals take the stripe write
//! lock. No operation ever holds more than one stripe lock.
//!
//! The table decides node lifetime: whoever removes a node from its stripe
//! owns the removal and is the only one allowed to report it.

use crate::entry::Node;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use parking_lot::RwLock;
use std::sync::Arc;

#[cfg(feature = "hashbrown")]
use hashbrown::hash_map::Entry;
#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::Entry;
#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

type Stripe<K, V, S> = RwLock<HashMap<K, Arc<Node<K, V>>, S>>;

/// Result of [`Table::insert`].
const MAX_PREALLOCATED: usize = 1 << 16;

#[derive(Debug)]
pub(crate) enum Insertion<K, V> {
    /// A new node now maps the key. `displaced` is a dead node it replaced.
    Inserted {
        node: Arc<Node<K, V>>,
        displaced: Option<Arc<Node<K, V>>>,
    },
    /// A live node was already present. `value` is its previous value when
    /// replacing, or the rejected new value otherwise.
    Present { node: Arc<Node<K, V>>, value: V },
}

pub(crate) struct Table<K, V, S> {
    stripes: Box<[Stripe<K, V, S>]>,
    hash_builder: S,
}

impl<K, V, S> Table<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    pub(crate) fn new(stripes: usize, capacity: usize, hash_builder: S) -> Self {
        let stripes = stripes.max(1);
        // maps grow on demand past this
        let per_stripe = capacity.min(MAX_PREALLOCATED) / stripes + 1;
        let stripes: Vec<_> = (0..stripes)
            .map(|_| {
                RwLock::new(HashMap::with_capacity_and_hasher(
                    per_stripe,
                    hash_builder.clone(),
                ))
            })
            .collect();
        Table {
            stripes: stripes.into_boxed_slice(),
            hash_builder,
        }
    }

    #[inline]
    pub(crate) fn hash<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        self.hash_builder.hash_one(key)
    }

    #[inline]
    fn stripe(&self, hash: u64) -> &Stripe<K, V, S> {
        // low bits index the stripe's own buckets
        &self.stripes[((hash >> 32) as usize) % self.stripes.len()]
    }

    #[inline]
    pub(crate) fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    pub(crate) fn get<Q>(&self, hash: u64, key: &Q) -> Option<Arc<Node<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.stripe(hash).read().get(key).cloned()
    }

    /// Maps `key` to a node holding `value`.
    ///
    /// A node rejected by `is_live` counts as absent and is displaced.
    /// Otherwise a present node either has its value replaced (`replace`)
    /// or is kept. `make` builds the node for a fresh mapping.
    pub(crate) fn insert(
        &self,
        hash: u64,
        key: K,
        value: V,
        replace: bool,
        is_live: impl FnOnce(&Node<K, V>) -> bool,
        make: impl FnOnce(K, V) -> Arc<Node<K, V>>,
    ) -> Insertion<K, V> {
        let mut stripe = self.stripe(hash).write();
        match stripe.entry(key) {
            Entry::Occupied(mut entry) => {
                if !is_live(entry.get().as_ref()) {
                    let node = make(entry.key().clone(), value);
                    let displaced = core::mem::replace(entry.get_mut(), Arc::clone(&node));
                    return Insertion::Inserted {
                        node,
                        displaced: Some(displaced),
                    };
                }
                let node = Arc::clone(entry.get());
                let value = if replace {
                    node.replace_value(value)
                } else {
                    value
                };
                Insertion::Present { node, value }
            }
            Entry::Vacant(entry) => {
                let node = make(entry.key().clone(), value);
                entry.insert(Arc::clone(&node));
                Insertion::Inserted {
                    node,
                    displaced: None,
                }
            }
        }
    }

    /// Replaces the value of a live node already mapped by `key`.
    pub(crate) fn replace<Q>(
        &self,
        hash: u64,
        key: &Q,
        value: V,
        is_live: impl FnOnce(&Node<K, V>) -> bool,
    ) -> Option<(Arc<Node<K, V>>, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let stripe = self.stripe(hash).read();
        let node = stripe.get(key)?;
        if !is_live(node.as_ref()) {
            return None;
        }
        let old = node.replace_value(value);
        Some((Arc::clone(node), old))
    }

    pub(crate) fn remove<Q>(&self, hash: u64, key: &Q) -> Option<Arc<Node<K, V>>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.stripe(hash).write().remove(key)
    }

    /// Removes `node` only if its key still maps to this exact node.
    pub(crate) fn remove_if_same(&self, node: &Arc<Node<K, V>>) -> bool {
        let mut stripe = self.stripe(node.hash()).write();
        let same = stripe
            .get(node.key())
            .is_some_and(|current| Arc::ptr_eq(current, node));
        if same {
            stripe.remove(node.key());
        }
        same
    }

    /// Total number of mapped keys. Stripes are read one after another, so
    /// the sum may be stale under concurrent writes.
    pub(crate) fn len(&self) -> usize {
        self.stripes.iter().map(|s| s.read().len()).sum()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stripes.iter().all(|s| s.read().is_empty())
    }

    /// Keys of nodes accepted by `keep`, one stripe at a time.
    pub(crate) fn keys(&self, mut keep: impl FnMut(&Node<K, V>) -> bool) -> Vec<K> {
        let mut keys = Vec::new();
        for stripe in self.stripes.iter() {
            for (key, node) in stripe.read().iter() {
                if keep(node.as_ref()) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }

    /// Empties every stripe and returns the detached nodes.
    pub(crate) fn drain(&self) -> Vec<Arc<Node<K, V>>> {
        let mut nodes = Vec::new();
        for stripe in self.stripes.iter() {
            nodes.extend(stripe.write().drain().map(|(_, node)| node));
        }
        nodes
    }
}

impl<K, V, S> core::fmt::Debug for Table<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Table")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::NEVER;
    use std::collections::hash_map::RandomState;

    fn table() -> Table<String, i32, RandomState> {
        Table::new(4, 16, RandomState::new())
    }

    fn put(
        t: &Table<String, i32, RandomState>,
        key: &str,
        value: i32,
        replace: bool,
    ) -> Insertion<String, i32> {
        let hash = t.hash(key);
        t.insert(hash, key.to_string(), value, replace, |_| true, |k, v| {
            Arc::new(Node::new(k, v, hash, NEVER))
        })
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let t: Table<String, i32, RandomState> = Table::new(4, usize::MAX, RandomState::new());
        assert!(t.is_empty());
        assert!(matches!(put(&t, "a", 1, true), Insertion::Inserted { .. }));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_insert_get_remove() {
        let t = table();
        assert!(matches!(put(&t, "a", 1, true), Insertion::Inserted { displaced: None, .. }));
        let hash = t.hash("a");
        assert_eq!(t.get(hash, "a").map(|n| n.value()), Some(1));
        assert_eq!(t.len(), 1);

        let removed = t.remove(hash, "a").unwrap();
        assert_eq!(removed.value(), 1);
        assert!(t.get(hash, "a").is_none());
        assert!(t.is_empty());
    }

    #[test]
    fn test_insert_replace_or_keep() {
        let t = table();
        put(&t, "a", 1, true);
        match put(&t, "a", 2, true) {
            Insertion::Present { node, value } => {
                assert_eq!(value, 1);
                assert_eq!(node.value(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        match put(&t, "a", 3, false) {
            Insertion::Present { node, value } => {
                assert_eq!(value, 3);
                assert_eq!(node.value(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dead_node_is_displaced() {
        let t = table();
        put(&t, "a", 1, true);
        let hash = t.hash("a");
        let result = t.insert(hash, "a".to_string(), 2, false, |_| false, |k, v| {
            Arc::new(Node::new(k, v, hash, NEVER))
        });
        match result {
            Insertion::Inserted {
                node,
                displaced: Some(old),
            } => {
                assert_eq!(node.value(), 2);
                assert_eq!(old.value(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_remove_if_same_ignores_successor() {
        let t = table();
        put(&t, "a", 1, true);
        let hash = t.hash("a");
        let first = t.get(hash, "a").unwrap();
        t.remove(hash, "a");
        put(&t, "a", 2, true);

        assert!(!t.remove_if_same(&first));
        assert_eq!(t.get(hash, "a").map(|n| n.value()), Some(2));

        let second = t.get(hash, "a").unwrap();
        assert!(t.remove_if_same(&second));
        assert!(t.is_empty());
    }

    #[test]
    fn test_replace_requires_live_node() {
        let t = table();
        let hash = t.hash("a");
        assert!(t.replace(hash, "a", 5, |_| true).is_none());
        put(&t, "a", 1, true);
        assert!(t.replace(hash, "a", 5, |_| false).is_none());
        let (node, old) = t.replace(hash, "a", 5, |_| true).unwrap();
        assert_eq!((old, node.value()), (1, 5));
    }

    #[test]
    fn test_keys_and_drain() {
        let t = table();
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            put(&t, key, i as i32, true);
        }
        let mut keys = t.keys(|node| node.value() != 1);
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "c".to_string()]);

        let drained = t.drain();
        assert_eq!(drained.len(), 3);
        assert!(t.is_empty());
        assert_eq!(t.stripe_count(), 4);
    }
}
