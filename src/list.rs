//! Index-linked doubly linked lists sharing one slot arena.
//!
//! Several [`List`]s thread through the same [`Arena`]: each slot carries its
//! own `prev`/`next` links, so moving an entry between lists is an unlink
//! plus a push and never reallocates. Slots are addressed by plain `usize`
//! indices and freed slots are recycled through a free list.
//!
//! ```text
//!   arena: [ s0 | s1 | s2 | s3 | s4 ]      free: [s3]
//!
//!   window:    head ─► s2 ◄──► s4 ◄── tail
//!   probation: head ─► s0 ◄── tail
//!   protected: head ─► s1 ◄── tail
//! ```
//!
//! Lists keep the least recently used entry at the head and the most
//! recently used at the tail.
//!
//! **Note**: internal infrastructure. A `List` must only ever be used with
//! the arena its slots were allocated from; indices carry no provenance.

/// Sentinel index meaning "no slot".
pub(crate) const NIL: usize = usize::MAX;

/// A slot in the arena.
#[derive(Debug)]
pub(crate) struct Entry<T> {
    val: Option<T>,
    prev: usize,
    next: usize,
}

/// Slot storage shared by any number of lists.
#[derive(Debug)]
pub(crate) struct Arena<T> {
    entries: Vec<Entry<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Arena<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Arena {
            entries: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of occupied slots.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Stores `val` in a free slot and returns its index. The slot is not
    /// linked into any list.
    pub(crate) fn insert(&mut self, val: T) -> usize {
        self.len += 1;
        let entry = Entry {
            val: Some(val),
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.entries[idx] = entry;
                idx
            }
            None => {
                self.entries.push(entry);
                self.entries.len() - 1
            }
        }
    }

    /// Frees the slot and returns its value. The slot must already be
    /// unlinked from its list.
    pub(crate) fn remove(&mut self, idx: usize) -> Option<T> {
        let entry = self.entries.get_mut(idx)?;
        let val = entry.val.take()?;
        debug_assert!(entry.prev == NIL && entry.next == NIL, "slot still linked");
        self.free.push(idx);
        self.len -= 1;
        Some(val)
    }

    #[inline]
    pub(crate) fn get(&self, idx: usize) -> Option<&T> {
        self.entries.get(idx).and_then(|e| e.val.as_ref())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.entries.get_mut(idx).and_then(|e| e.val.as_mut())
    }

    /// Iterates over every occupied slot as `(index, value)`.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(idx, e)| e.val.as_ref().map(|v| (idx, v)))
    }

    /// Drops every slot. Lists built on this arena must be cleared too.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
        self.len = 0;
    }
}

/// A doubly linked list of arena slots.
#[derive(Debug, Clone, Copy)]
pub(crate) struct List {
    head: usize,
    tail: usize,
    len: usize,
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl List {
    pub(crate) const fn new() -> Self {
        List {
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Least recently used slot.
    #[inline]
    pub(crate) fn front(&self) -> Option<usize> {
        (self.head != NIL).then_some(self.head)
    }

    /// Slot after `idx`, toward the most recently used end.
    #[cfg(test)]
    pub(crate) fn next_of<T>(&self, arena: &Arena<T>, idx: usize) -> Option<usize> {
        let next = arena.entries[idx].next;
        (next != NIL).then_some(next)
    }

    /// Links an unlinked slot at the most recently used end.
    pub(crate) fn push_back<T>(&mut self, arena: &mut Arena<T>, idx: usize) {
        debug_assert!(arena.entries[idx].prev == NIL && arena.entries[idx].next == NIL);
        arena.entries[idx].prev = self.tail;
        arena.entries[idx].next = NIL;
        if self.tail != NIL {
            arena.entries[self.tail].next = idx;
        } else {
            self.head = idx;
        }
        self.tail = idx;
        self.len += 1;
    }

    /// Detaches `idx`, which must be a member of this list.
    pub(crate) fn unlink<T>(&mut self, arena: &mut Arena<T>, idx: usize) {
        let (prev, next) = {
            let entry = &arena.entries[idx];
            (entry.prev, entry.next)
        };
        if prev != NIL {
            arena.entries[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            arena.entries[next].prev = prev;
        } else {
            self.tail = prev;
        }
        arena.entries[idx].prev = NIL;
        arena.entries[idx].next = NIL;
        self.len -= 1;
    }

    pub(crate) fn move_to_back<T>(&mut self, arena: &mut Arena<T>, idx: usize) {
        if self.tail == idx {
            return;
        }
        self.unlink(arena, idx);
        self.push_back(arena, idx);
    }

    pub(crate) fn pop_front<T>(&mut self, arena: &mut Arena<T>) -> Option<usize> {
        let idx = self.front()?;
        self.unlink(arena, idx);
        Some(idx)
    }

    /// Forgets every member without touching the arena.
    pub(crate) fn clear(&mut self) {
        *self = List::new();
    }

    /// Iterates from least to most recently used.
    #[cfg(test)]
    pub(crate) fn iter<'a, T>(&self, arena: &'a Arena<T>) -> ListIter<'a, T> {
        ListIter {
            arena,
            cursor: self.head,
        }
    }
}

/// Iterator over the slot indices of a [`List`].
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ListIter<'a, T> {
    arena: &'a Arena<T>,
    cursor: usize,
}

#[cfg(test)]
impl<T> Iterator for ListIter<'_, T> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == NIL {
            return None;
        }
        let idx = self.cursor;
        self.cursor = self.arena.entries[idx].next;
        Some(idx)
    }
}
