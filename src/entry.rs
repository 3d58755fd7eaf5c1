//! Cache node.
//!
//! A `Node` is created when a key is first inserted and lives for as long as
//! the key maps to it in the table. It is shared (`Arc`) between three
//! owners with different rights:
//!
//! - the table, which decides the node's lifetime: removing the node from
//!   the table is what ends it, and only one caller can win that removal;
//! - the event buffers, which hold short-lived references until drained;
//! - the policy arena, which holds an ordering reference while the node is
//!   linked into a region.
//!
//! The value can be replaced in place. The arena slot index is written only
//! inside the maintenance section.

use crate::list::NIL;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::expiry::NEVER;

/// A key/value pair plus the bookkeeping the cache needs for it.
#[derive(Debug)]
pub(crate) struct Node<K, V> {
    key: K,
    value: RwLock<V>,
    hash: u64,
    /// Arena slot, or `NIL` when not linked into the policy.
    slot: AtomicUsize,
    /// Expiry deadline in clock nanoseconds, `NEVER` when unbounded.
    expire_at: AtomicU64,
    /// Set once the node has been detached from the table.
    removed: AtomicBool,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(key: K, value: V, hash: u64, expire_at: u64) -> Self {
        Node {
            key,
            value: RwLock::new(value),
            hash,
            slot: AtomicUsize::new(NIL),
            expire_at: AtomicU64::new(expire_at),
            removed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub(crate) fn hash(&self) -> u64 {
        self.hash
    }

    /// Returns a copy of the current value.
    #[inline]
    pub(crate) fn value(&self) -> V
    where
        V: Clone,
    {
        self.value.read().clone()
    }

    /// Applies `f` to the current value under the node's read lock.
    #[inline]
    pub(crate) fn with_value<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.value.read())
    }

    /// Swaps in a new value and returns the old one.
    #[inline]
    pub(crate) fn replace_value(&self, value: V) -> V {
        core::mem::replace(&mut *self.value.write(), value)
    }

    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.slot.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_slot(&self, slot: usize) {
        self.slot.store(slot, Ordering::Release);
    }

    #[inline]
    pub(crate) fn expire_at(&self) -> u64 {
        self.expire_at.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_expire_at(&self, deadline: u64) {
        self.expire_at.store(deadline, Ordering::Release);
    }

    #[inline]
    pub(crate) fn has_deadline(&self) -> bool {
        self.expire_at() != NEVER
    }

    #[inline]
    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }
}
