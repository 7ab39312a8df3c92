use crossbeam_ebr::{unprotected, Atomic, Guard, Owned};

use std::sync::atomic::Ordering;

use crate::ds_impl::traverse::{locate_pred, Link};

struct Node<K, V> {
    key: K,
    value: V,
    /// Mark: tag(), Tag: not needed
    next: Atomic<Node<K, V>>,
}

impl<K: Ord, V> Link for Node<K, V> {
    type Key = K;

    #[inline]
    fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    fn next(&self) -> &Atomic<Self> {
        &self.next
    }
}

/// Harris-Michael list holding the committed state of a boosted set.
/// Concurrent callers must not touch the same key at once; the lock table
/// in front of it guarantees that.
pub struct LockFreeList<K, V> {
    head: Atomic<Node<K, V>>,
}

impl<K, V> Default for LockFreeList<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for LockFreeList<K, V> {
    fn drop(&mut self) {
        unsafe {
            let mut curr = self.head.load(Ordering::Relaxed, unprotected());

            while !curr.is_null() {
                let next = curr.deref().next.load(Ordering::Relaxed, unprotected());
                drop(curr.into_owned());
                curr = next.with_tag(0);
            }
        }
    }
}

impl<K, V> LockFreeList<K, V>
where
    K: Ord,
{
    pub fn new() -> Self {
        LockFreeList {
            head: Atomic::null(),
        }
    }

    pub fn get<'g>(&'g self, key: &K, guard: &'g Guard) -> Option<&'g V> {
        let (found, cursor) = locate_pred(&self.head, key, guard);

        if found {
            cursor.node().map(|n| &n.value)
        } else {
            None
        }
    }

    pub fn insert(&self, key: K, value: V, guard: &Guard) -> bool {
        let mut node = Owned::new(Node {
            key,
            value,
            next: Atomic::null(),
        });

        loop {
            let (found, cursor) = locate_pred(&self.head, &node.key, guard);
            if found {
                return false;
            }

            node.next.store(cursor.curr, Ordering::Relaxed);
            match cursor
                .prev
                .compare_exchange(cursor.curr, node, Ordering::AcqRel, Ordering::Acquire, guard)
            {
                Ok(_) => return true,
                Err(e) => node = e.new,
            }
        }
    }

    pub fn remove(&self, key: &K, guard: &Guard) -> Option<V>
    where
        V: Clone,
    {
        loop {
            let (found, cursor) = locate_pred(&self.head, key, guard);
            let curr_node = match cursor.node() {
                Some(node) if found => node,
                _ => return None,
            };

            let next = curr_node.next.fetch_or(1, Ordering::AcqRel, guard);
            if next.tag() == 1 {
                continue;
            }
            let value = curr_node.value.clone();

            if cursor
                .prev
                .compare_exchange(cursor.curr, next, Ordering::AcqRel, Ordering::Acquire, guard)
                .is_ok()
            {
                unsafe { guard.defer_destroy(cursor.curr) };
            }

            return Some(value);
        }
    }

    /// Visits unmarked entries in key order.
    pub fn for_each<'g, F>(&'g self, guard: &'g Guard, mut f: F)
    where
        F: FnMut(&'g K, &'g V),
    {
        let mut curr = self.head.load(Ordering::Acquire, guard);

        while let Some(node) = unsafe { curr.as_ref() } {
            let next = node.next.load(Ordering::Acquire, guard);
            if next.tag() == 0 {
                f(&node.key, &node.value);
            }
            curr = next.with_tag(0);
        }
    }
}
