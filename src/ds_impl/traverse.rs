//! The sorted-list traversal shared by both engines.

use crossbeam_ebr::{Atomic, Guard, Shared};

use std::cmp::Ordering::{Equal, Greater, Less};
use std::sync::atomic::Ordering;

/// A node of a sorted singly-linked list whose successor pointer carries the
/// deletion mark in its tag bit.
pub trait Link: Sized {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
    /// Mark: tag()
    fn next(&self) -> &Atomic<Self>;
}

pub struct Cursor<'g, N> {
    pub prev: &'g Atomic<N>,
    pub curr: Shared<'g, N>,
}

impl<'g, N> Cursor<'g, N> {
    #[inline]
    pub fn node(&self) -> Option<&'g N> {
        unsafe { self.curr.as_ref() }
    }
}

/// Returns (1) whether a node with `key` is present, and (2) the tightest
/// bracket: `prev` is the link of the last unmarked node with a smaller key
/// (or the head), `curr` the first node with key >= `key` (null for the tail).
///
/// Marked nodes met on the way are unlinked and retired. A failed unlink means
/// the bracket went stale, and the traversal restarts from the head.
#[inline]
fn try_locate_pred<'g, N: Link>(
    head: &'g Atomic<N>,
    key: &N::Key,
    guard: &'g Guard,
) -> Result<(bool, Cursor<'g, N>), ()> {
    let mut cursor = Cursor {
        prev: head,
        curr: head.load(Ordering::Acquire, guard),
    };

    loop {
        debug_assert_eq!(cursor.curr.tag(), 0);

        let curr_node = match unsafe { cursor.curr.as_ref() } {
            None => return Ok((false, cursor)),
            Some(c) => c,
        };

        let mut next = curr_node.next().load(Ordering::Acquire, guard);

        if next.tag() == 0 {
            match curr_node.key().cmp(key) {
                Less => cursor.prev = curr_node.next(),
                Equal => return Ok((true, cursor)),
                Greater => return Ok((false, cursor)),
            }
        } else {
            next = next.with_tag(0);
            match cursor.prev.compare_exchange(
                cursor.curr,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Err(_) => return Err(()),
                Ok(_) => unsafe { guard.defer_destroy(cursor.curr) },
            }
        }
        cursor.curr = next;
    }
}

pub fn locate_pred<'g, N: Link>(
    head: &'g Atomic<N>,
    key: &N::Key,
    guard: &'g Guard,
) -> (bool, Cursor<'g, N>) {
    loop {
        if let Ok(r) = try_locate_pred(head, key, guard) {
            return r;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{locate_pred, Link};
    use crossbeam_ebr::{pin, unprotected, Atomic, Owned};
    use std::sync::atomic::Ordering;

    struct Node {
        key: i32,
        next: Atomic<Node>,
    }

    impl Link for Node {
        type Key = i32;

        fn key(&self) -> &i32 {
            &self.key
        }

        fn next(&self) -> &Atomic<Node> {
            &self.next
        }
    }

    fn build(keys: &[i32]) -> Atomic<Node> {
        let head = Atomic::null();
        for key in keys.iter().rev() {
            let node = Owned::new(Node {
                key: *key,
                next: Atomic::null(),
            });
            let first = head.load(Ordering::Relaxed, unsafe { unprotected() });
            node.next.store(first, Ordering::Relaxed);
            head.store(node, Ordering::Relaxed);
        }
        head
    }

    fn free(head: Atomic<Node>) {
        unsafe {
            let mut curr = head.load(Ordering::Relaxed, unprotected());
            while !curr.is_null() {
                let next = curr.deref().next.load(Ordering::Relaxed, unprotected());
                drop(curr.into_owned());
                curr = next.with_tag(0);
            }
        }
    }

    #[test]
    fn brackets_key() {
        let head = build(&[1, 3, 5]);
        let guard = pin();
        let guard = &guard;

        let (found, cursor) = locate_pred(&head, &3, guard);
        assert!(found);
        assert_eq!(cursor.node().map(|n| n.key), Some(3));

        let (found, cursor) = locate_pred(&head, &4, guard);
        assert!(!found);
        assert_eq!(cursor.node().map(|n| n.key), Some(5));

        let (found, cursor) = locate_pred(&head, &9, guard);
        assert!(!found);
        assert!(cursor.curr.is_null());

        free(head);
    }

    #[test]
    fn unlinks_marked_nodes() {
        let head = build(&[1, 3, 5]);
        let guard = pin();
        let guard = &guard;

        let (_, cursor) = locate_pred(&head, &3, guard);
        cursor
            .node()
            .unwrap()
            .next
            .fetch_or(1, Ordering::AcqRel, guard);

        let (found, cursor) = locate_pred(&head, &3, guard);
        assert!(!found);
        assert_eq!(cursor.node().map(|n| n.key), Some(5));

        let first = unsafe { head.load(Ordering::Acquire, guard).deref() };
        let second = unsafe { first.next.load(Ordering::Acquire, guard).deref() };
        assert_eq!(second.key, 5);

        free(head);
    }
}
