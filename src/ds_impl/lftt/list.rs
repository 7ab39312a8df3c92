use crossbeam_ebr::{unprotected, Atomic, Guard, Owned, Shared};
use tracing::{debug, trace, warn};

use std::fmt::Debug;
use std::io::{self, stdout, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::descriptor::{NodeDesc, TxnDesc, TxnStatus};
use super::help_stack::{Frame, HelpStack};
use crate::ds_impl::stats::{StatsSnapshot, TxnStats};
use crate::ds_impl::transactional_set::{
    OpType, Operation, Outcome, ReturnCode, TransactionalSet,
};
use crate::ds_impl::traverse::{locate_pred, Link};

pub struct Node<K, V> {
    key: K,
    /// Mark: tag()
    next: Atomic<Node<K, V>>,
    /// Mark: tag(). A marked descriptor is final: the node is logically gone
    /// and only waits to be unlinked.
    desc: Atomic<NodeDesc<K, V>>,
}

impl<K, V> Node<K, V> {
    fn new(key: K, desc: NodeDesc<K, V>) -> Self {
        Node {
            key,
            next: Atomic::null(),
            desc: Atomic::new(desc),
        }
    }
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

impl<K, V> Drop for Node<K, V> {
    fn drop(&mut self) {
        unsafe {
            let desc = self.desc.load(Ordering::Relaxed, unprotected());
            if !desc.is_null() {
                drop(desc.with_tag(0).into_owned());
            }
        }
    }
}

/// What one attempt at one operation produced.
enum Step<'g, K, V> {
    Done(ReturnCode, Option<Shared<'g, Node<K, V>>>),
    /// The target node is held by another active transaction, which must be
    /// driven forward from the given operation first.
    Help(Arc<TxnDesc<K, V>>, usize),
}

/// Lock-free transactional set: a sorted linked list whose nodes carry
/// descriptors of the transaction that last touched them.
///
/// A transaction never waits. When it meets a node owned by another active
/// transaction it finishes that transaction's remaining operations itself,
/// then retries.
pub struct TransList<K, V> {
    head: Atomic<Node<K, V>>,
    next_txn_id: AtomicU64,
    stats: Arc<TxnStats>,
}

impl<K, V> Drop for TransList<K, V> {
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

#[inline]
fn is_node_exist<K: Ord, V>(node: Option<&Node<K, V>>, key: &K) -> bool {
    node.map_or(false, |n| n.key == *key)
}

/// A committed insert shows only on the node its effect was recorded for.
/// Any other node carrying it was linked by a helper that fell behind after
/// the transaction had finished, and never held the key.
#[inline]
fn is_stale<K, V>(node: Shared<'_, Node<K, V>>, desc: &NodeDesc<K, V>) -> bool {
    desc.op_type() == OpType::Insert
        && desc.is_node_active()
        && desc.txn.effect(desc.opid) != node.as_raw() as usize
}

#[inline]
fn record_effect<K, V>(txn: &TxnDesc<K, V>, opid: usize, node: Shared<'_, Node<K, V>>) {
    if txn.op(opid).op_type() == OpType::Insert {
        txn.record_effect(opid, node.as_raw() as usize);
    }
}

/// Logical content of `node`, whose descriptor is `desc`, as seen from
/// `viewer`.
#[inline]
fn resolve<'g, K, V>(
    node: Shared<'_, Node<K, V>>,
    desc: &'g NodeDesc<K, V>,
    viewer: Option<&Arc<TxnDesc<K, V>>>,
) -> Option<&'g V> {
    if is_stale(node, desc) {
        None
    } else {
        desc.content(viewer)
    }
}

/// Retires `node` for good: the descriptor is marked first so nobody can
/// attach to it again, then the successor pointer so traversals unlink it.
fn mark_node<'g, K, V>(
    node: &Node<K, V>,
    desc: Shared<'g, NodeDesc<K, V>>,
    guard: &'g Guard,
) -> bool {
    if node
        .desc
        .compare_exchange(
            desc,
            desc.with_tag(1),
            Ordering::AcqRel,
            Ordering::Acquire,
            guard,
        )
        .is_err()
    {
        return false;
    }
    node.next.fetch_or(1, Ordering::AcqRel, guard);
    true
}

/// The descriptor of `curr`, unless the node is on its way out of the list,
/// in which case this helps retire it and the caller must search again.
#[inline]
fn settled_desc<'g, K, V>(
    curr: Shared<'g, Node<K, V>>,
    guard: &'g Guard,
) -> Option<Shared<'g, NodeDesc<K, V>>> {
    let curr_ref = unsafe { curr.deref() };
    let desc = curr_ref.desc.load(Ordering::Acquire, guard);

    if desc.tag() != 0 {
        curr_ref.next.fetch_or(1, Ordering::AcqRel, guard);
        return None;
    }
    if is_stale(curr, unsafe { desc.deref() }) {
        mark_node(curr_ref, desc, guard);
        return None;
    }
    Some(desc)
}

impl<K, V> TransList<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    pub fn with_stats(stats: Arc<TxnStats>) -> Self {
        TransList {
            head: Atomic::null(),
            next_txn_id: AtomicU64::new(0),
            stats,
        }
    }

    pub fn stats_handle(&self) -> Arc<TxnStats> {
        self.stats.clone()
    }

    pub fn reset_metrics(&self) {
        self.stats.reset();
    }

    pub fn allocate_desc(&self, ops: &[Operation<K, V>]) -> Arc<TxnDesc<K, V>> {
        let id = self.next_txn_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(TxnDesc::new(id, ops.to_vec().into_boxed_slice()))
    }

    /// Runs `txn` to a terminal status and returns whether it committed.
    pub fn execute_desc(&self, txn: &Arc<TxnDesc<K, V>>, guard: &Guard) -> bool {
        self.help_ops(txn.clone(), guard);
        let status = txn.status();
        debug_assert_ne!(status, TxnStatus::Active);
        status == TxnStatus::Committed
    }

    fn help_ops<'g>(&'g self, root: Arc<TxnDesc<K, V>>, guard: &'g Guard) {
        let mut stack = HelpStack::new(root);

        while let Some(frame) = stack.top_mut() {
            if frame.is_finished() {
                if let Some(frame) = stack.pop() {
                    self.finalize(&frame, guard);
                }
                continue;
            }

            match self.execute_op(&frame.txn, frame.opid, guard) {
                Step::Done(ret, node) => {
                    frame.touched.extend(node);
                    if ret == ReturnCode::Fail {
                        frame.failed = true;
                    } else {
                        frame.opid += 1;
                    }
                }
                Step::Help(other, opid) => match stack.position(&other) {
                    None => stack.push(other, opid),
                    Some(from) => self.break_cycle(&mut stack, from, guard),
                },
            }
        }
    }

    fn break_cycle<'g>(&'g self, stack: &mut HelpStack<'g, K, V>, from: usize, guard: &'g Guard) {
        let victim = stack.cycle_victim(from);
        let frame = stack.unwind_to(victim);
        if frame.txn.finalize(TxnStatus::Aborted) {
            self.stats.record_abort(true);
            debug!(txn = frame.txn.id(), "aborted to break a helping cycle");
        }
        self.mark_for_deletion(&frame, guard);
    }

    fn finalize<'g>(&'g self, frame: &Frame<'g, K, V>, guard: &'g Guard) {
        let txn = &frame.txn;
        if frame.failed {
            if txn.finalize(TxnStatus::Aborted) {
                self.stats.record_abort(false);
                trace!(txn = txn.id(), "aborted");
            }
        } else if frame.opid >= txn.size() && txn.finalize(TxnStatus::Committed) {
            self.stats.record_commit();
            trace!(txn = txn.id(), "committed");
        }
        self.mark_for_deletion(frame, guard);
    }

    /// Unlinks the nodes `frame` touched that hold nothing now that its
    /// transaction is over: deletions after a commit, insertions after an
    /// abort, and inserts linked by helpers that fell behind.
    fn mark_for_deletion<'g>(&'g self, frame: &Frame<'g, K, V>, guard: &'g Guard) {
        if frame.txn.is_active() {
            return;
        }

        for node in &frame.touched {
            let node_ref = unsafe { node.deref() };
            let desc = node_ref.desc.load(Ordering::Acquire, guard);
            if desc.tag() != 0 {
                continue;
            }

            let desc_ref = unsafe { desc.deref() };
            if !desc_ref.is_owned_by(&frame.txn) || resolve(*node, desc_ref, None).is_some() {
                continue;
            }

            if mark_node(node_ref, desc, guard) {
                let _ = locate_pred(&self.head, &node_ref.key, guard);
            }
        }
    }

    #[inline]
    fn execute_op<'g>(
        &'g self,
        txn: &Arc<TxnDesc<K, V>>,
        opid: usize,
        guard: &'g Guard,
    ) -> Step<'g, K, V> {
        match txn.op(opid) {
            Operation::Insert(key, value) => self.do_insert(key, value, txn, opid, guard),
            Operation::Delete(key) => self.do_delete(key, txn, opid, guard),
            Operation::Find(key) => self.do_find(key, txn, opid, guard),
        }
    }

    /// The node's owner must reach a terminal status before anyone else may
    /// build on its descriptor. Nodes of the caller's own transaction are
    /// always usable.
    #[inline]
    fn finish_pending_txn<'g>(
        &self,
        curr: Shared<'g, Node<K, V>>,
        desc: &NodeDesc<K, V>,
        txn: &Arc<TxnDesc<K, V>>,
    ) -> Option<Step<'g, K, V>> {
        if desc.is_owned_by(txn) || !desc.txn.is_active() {
            return None;
        }
        // Helping resumes after this operation, so its effect must be on
        // record before anyone can commit the owner.
        record_effect(&desc.txn, desc.opid, curr);
        Some(Step::Help(desc.txn.clone(), desc.opid + 1))
    }

    fn do_insert<'g>(
        &'g self,
        key: &K,
        value: &V,
        txn: &Arc<TxnDesc<K, V>>,
        opid: usize,
        guard: &'g Guard,
    ) -> Step<'g, K, V> {
        let mut new_node: Option<Owned<Node<K, V>>> = None;

        loop {
            let (_, cursor) = locate_pred(&self.head, key, guard);

            if !is_node_exist(cursor.node(), key) {
                if !txn.is_active() {
                    return Step::Done(ReturnCode::Fail, None);
                }

                let node = new_node.take().unwrap_or_else(|| {
                    let desc = NodeDesc::new(txn.clone(), opid, None, Some(value.clone()));
                    Owned::new(Node::new(key.clone(), desc))
                });
                node.next.store(cursor.curr, Ordering::Relaxed);

                match cursor.prev.compare_exchange(
                    cursor.curr,
                    node,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(node) => {
                        record_effect(txn, opid, node);
                        return Step::Done(ReturnCode::Ok, Some(node));
                    }
                    Err(e) => new_node = Some(e.new),
                }
                continue;
            }

            let curr = cursor.curr;
            let old = match settled_desc(curr, guard) {
                Some(old) => old,
                None => continue,
            };

            let old_ref = unsafe { old.deref() };
            if let Some(help) = self.finish_pending_txn(curr, old_ref, txn) {
                return help;
            }

            if old_ref.is_done(txn, opid) {
                record_effect(txn, opid, curr);
                return Step::Done(ReturnCode::Skip, Some(curr));
            }

            if old_ref.is_key_exist(txn) || !txn.is_active() {
                return Step::Done(ReturnCode::Fail, None);
            }

            let desc = Owned::new(NodeDesc::new(
                txn.clone(),
                opid,
                old_ref.baseline(txn),
                Some(value.clone()),
            ));
            if unsafe { curr.deref() }
                .desc
                .compare_exchange(old, desc, Ordering::AcqRel, Ordering::Acquire, guard)
                .is_ok()
            {
                unsafe { guard.defer_destroy(old) };
                record_effect(txn, opid, curr);
                return Step::Done(ReturnCode::Ok, Some(curr));
            }
        }
    }

    fn do_delete<'g>(
        &'g self,
        key: &K,
        txn: &Arc<TxnDesc<K, V>>,
        opid: usize,
        guard: &'g Guard,
    ) -> Step<'g, K, V> {
        loop {
            let (_, cursor) = locate_pred(&self.head, key, guard);

            if !is_node_exist(cursor.node(), key) {
                return Step::Done(ReturnCode::Fail, None);
            }

            let curr = cursor.curr;
            let old = match settled_desc(curr, guard) {
                Some(old) => old,
                None => continue,
            };

            let old_ref = unsafe { old.deref() };
            if let Some(help) = self.finish_pending_txn(curr, old_ref, txn) {
                return help;
            }

            if old_ref.is_done(txn, opid) {
                return Step::Done(ReturnCode::Skip, Some(curr));
            }

            if !old_ref.is_key_exist(txn) || !txn.is_active() {
                return Step::Done(ReturnCode::Fail, None);
            }

            let desc = Owned::new(NodeDesc::new(txn.clone(), opid, old_ref.baseline(txn), None));
            if unsafe { curr.deref() }
                .desc
                .compare_exchange(old, desc, Ordering::AcqRel, Ordering::Acquire, guard)
                .is_ok()
            {
                unsafe { guard.defer_destroy(old) };
                return Step::Done(ReturnCode::Ok, Some(curr));
            }
        }
    }

    fn do_find<'g>(
        &'g self,
        key: &K,
        txn: &Arc<TxnDesc<K, V>>,
        opid: usize,
        guard: &'g Guard,
    ) -> Step<'g, K, V> {
        loop {
            let (_, cursor) = locate_pred(&self.head, key, guard);

            if !is_node_exist(cursor.node(), key) {
                return Step::Done(ReturnCode::Fail, None);
            }

            let curr = cursor.curr;
            let old = match settled_desc(curr, guard) {
                Some(old) => old,
                None => continue,
            };

            let old_ref = unsafe { old.deref() };
            if let Some(help) = self.finish_pending_txn(curr, old_ref, txn) {
                return help;
            }

            if old_ref.is_same_operation(txn, opid) {
                if let Some(value) = old_ref.after() {
                    txn.record_read(opid, value.clone());
                }
                return Step::Done(ReturnCode::Skip, Some(curr));
            }

            // Superseded by a later operation of this transaction; whoever
            // passed this one first has published the read.
            if old_ref.is_done(txn, opid) {
                return Step::Done(ReturnCode::Skip, Some(curr));
            }

            let value = match old_ref.content(Some(txn)) {
                Some(value) if txn.is_active() => value.clone(),
                _ => return Step::Done(ReturnCode::Fail, None),
            };

            let desc = Owned::new(NodeDesc::new(
                txn.clone(),
                opid,
                old_ref.baseline(txn),
                Some(value.clone()),
            ));
            if unsafe { curr.deref() }
                .desc
                .compare_exchange(old, desc, Ordering::AcqRel, Ordering::Acquire, guard)
                .is_ok()
            {
                unsafe { guard.defer_destroy(old) };
                txn.record_read(opid, value);
                return Step::Done(ReturnCode::Ok, Some(curr));
            }
        }
    }

    /// Calls `f` on every physical node with its committed content, or `None`
    /// if the node is logically absent.
    fn for_each_node<'g, F>(&'g self, guard: &'g Guard, mut f: F)
    where
        F: FnMut(&'g Node<K, V>, Option<&'g V>),
    {
        let mut curr = self.head.load(Ordering::Acquire, guard);

        while let Some(node) = unsafe { curr.as_ref() } {
            let next = node.next.load(Ordering::Acquire, guard);
            let desc = node.desc.load(Ordering::Acquire, guard);
            let content = if next.tag() == 0 && desc.tag() == 0 {
                resolve(curr, unsafe { desc.deref() }, None)
            } else {
                None
            };
            f(node, content);
            curr = next.with_tag(0);
        }
    }

    /// Writes one line per physical node, logically absent ones included.
    pub fn dump<W: Write>(&self, out: &mut W, guard: &Guard) -> io::Result<()>
    where
        K: Debug,
    {
        let mut result = Ok(());
        self.for_each_node(guard, |node, content| {
            if result.is_ok() {
                result = writeln!(
                    out,
                    "Node [{:p}] Key [{:?}] Status [{}]",
                    node,
                    node.key,
                    if content.is_some() { "Exist" } else { "Inexist" }
                );
            }
        });
        result
    }
}

impl<K, V> TransactionalSet<K, V> for TransList<K, V>
where
    K: Ord + Clone + Debug,
    V: Clone,
{
    fn new() -> Self {
        Self::with_stats(Arc::new(TxnStats::new()))
    }

    fn execute(&self, ops: &[Operation<K, V>], guard: &Guard) -> Outcome<V> {
        let txn = self.allocate_desc(ops);

        if !self.execute_desc(&txn, guard) {
            return Outcome::aborted(ReturnCode::Fail, ops.len());
        }

        let code = if ops.iter().all(|op| op.op_type() == OpType::Find) {
            ReturnCode::Skip
        } else {
            ReturnCode::Ok
        };
        let reads = (0..txn.size()).map(|i| txn.read(i).cloned()).collect();
        Outcome { code, reads }
    }

    fn snapshot(&self, guard: &Guard) -> Vec<(K, V)> {
        let mut entries = Vec::new();
        self.for_each_node(guard, |node, content| {
            if let Some(value) = content {
                entries.push((node.key.clone(), value.clone()));
            }
        });
        entries
    }

    fn print(&self, guard: &Guard) {
        if let Err(e) = self.dump(&mut stdout().lock(), guard) {
            warn!("cannot print the list: {}", e);
        }
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, Step, TransList};
    use crate::ds_impl::lftt::descriptor::{NodeDesc, TxnStatus};
    use crate::ds_impl::transactional_set::{self, Operation, ReturnCode, TransactionalSet};
    use crate::ds_impl::traverse::locate_pred;
    use crossbeam_ebr::{pin, Owned};
    use std::sync::atomic::Ordering;

    type List = TransList<i32, String>;

    fn physical_len(list: &List) -> usize {
        let guard = &pin();
        let mut len = 0;
        list.for_each_node(guard, |_, _| len += 1);
        len
    }

    #[test]
    fn smoke_trans_list() {
        transactional_set::tests::smoke::<List>();
    }

    #[test]
    fn round_trip_trans_list() {
        transactional_set::tests::round_trip::<List>();
    }

    #[test]
    fn batch_rollback_trans_list() {
        transactional_set::tests::batch_rollback::<List>();
    }

    #[test]
    fn read_only_batch_trans_list() {
        transactional_set::tests::read_only_batch::<List>();
    }

    #[test]
    fn repeated_key_in_batch_trans_list() {
        transactional_set::tests::repeated_key_in_batch::<List>();
    }

    #[test]
    fn duplicate_insert_race_trans_list() {
        transactional_set::tests::duplicate_insert_race::<List>();
    }

    #[test]
    fn crossing_batches_trans_list() {
        transactional_set::tests::crossing_batches::<List>();
    }

    #[test]
    fn token_transfer_trans_list() {
        transactional_set::tests::token_transfer::<List>();
    }

    #[test]
    fn stress_trans_list() {
        transactional_set::tests::stress::<List>(8, 2_000, 64);
    }

    #[test]
    fn read_only_commit_is_skip() {
        let list = List::new();
        let guard = &pin();
        assert!(list.insert(1, "a".to_string(), guard));
        assert_eq!(list.execute_ops(&[Operation::Find(1)], guard), ReturnCode::Skip);
        assert_eq!(list.execute_ops(&[], guard), ReturnCode::Skip);
        assert_eq!(list.execute_ops(&[Operation::Find(2)], guard), ReturnCode::Fail);
    }

    #[test]
    fn finishes_stalled_transaction() {
        let list = List::new();
        let guard = &pin();

        // A transaction whose thread stalled right after its first operation.
        let stalled = list.allocate_desc(&[
            Operation::Insert(1, "a".to_string()),
            Operation::Insert(2, "b".to_string()),
        ]);
        match list.execute_op(&stalled, 0, guard) {
            Step::Done(ReturnCode::Ok, Some(_)) => {}
            _ => panic!("first insert should attach"),
        }
        assert!(stalled.is_active());

        // Meeting its node finishes it instead of waiting for it.
        assert_eq!(list.find(&1, guard), Some("a".to_string()));
        assert_eq!(stalled.status(), TxnStatus::Committed);
        assert_eq!(list.find(&2, guard), Some("b".to_string()));
        assert!(list.execute_desc(&stalled, guard));
        assert_eq!(list.stats().count_commit, 3);
    }

    #[test]
    fn breaks_helping_cycle() {
        let list = List::new();
        let guard = &pin();

        let older = list.allocate_desc(&[
            Operation::Insert(1, "a".to_string()),
            Operation::Insert(2, "a".to_string()),
        ]);
        let younger = list.allocate_desc(&[
            Operation::Insert(2, "b".to_string()),
            Operation::Insert(1, "b".to_string()),
        ]);
        assert!(matches!(
            list.execute_op(&older, 0, guard),
            Step::Done(ReturnCode::Ok, _)
        ));
        assert!(matches!(
            list.execute_op(&younger, 0, guard),
            Step::Done(ReturnCode::Ok, _)
        ));

        // older waits on younger, which waits on older again.
        assert!(list.execute_desc(&older, guard));
        assert!(!list.execute_desc(&younger, guard));
        assert_eq!(younger.status(), TxnStatus::Aborted);

        let stats = list.stats();
        assert_eq!(stats.count_commit, 1);
        assert_eq!(stats.count_abort, 1);
        assert_eq!(stats.count_fake_abort, 1);
        assert_eq!(
            list.snapshot(guard),
            vec![(1, "a".to_string()), (2, "a".to_string())]
        );
    }

    #[test]
    fn unlinks_logically_absent_nodes() {
        let list = List::new();
        {
            let guard = &pin();
            for k in 1..=3 {
                assert!(list.insert(k, k.to_string(), guard));
            }
            assert!(list.delete(&2, guard));
            assert!(!list.execute_ops(
                &[Operation::Insert(5, "5".to_string()), Operation::Delete(9)],
                guard,
            )
            .is_committed());
        }
        assert_eq!(physical_len(&list), 2);

        let guard = &pin();
        let head = list.head.load(Ordering::Acquire, guard);
        let first = unsafe { head.deref() };
        assert_eq!(first.key, 1);
        assert_eq!(first.next.load(Ordering::Acquire, guard).tag(), 0);
    }

    #[test]
    fn ignores_late_insert_of_finished_transaction() {
        let list = List::new();
        let guard = &pin();

        let txn = list.allocate_desc(&[Operation::Insert(1, "a".to_string())]);
        assert!(list.execute_desc(&txn, guard));
        assert!(list.delete(&1, guard));
        assert_eq!(physical_len(&list), 0);

        // A helper that read `txn` as active links its own node only now.
        let (found, cursor) = locate_pred(&list.head, &1, guard);
        assert!(!found);
        let desc = NodeDesc::new(txn.clone(), 0, None, Some("a".to_string()));
        let node = Owned::new(Node::new(1, desc));
        node.next.store(cursor.curr, Ordering::Relaxed);
        assert!(cursor
            .prev
            .compare_exchange(cursor.curr, node, Ordering::AcqRel, Ordering::Acquire, guard)
            .is_ok());

        assert_eq!(physical_len(&list), 1);
        assert!(list.snapshot(guard).is_empty());
        assert_eq!(list.find(&1, guard), None);
        assert!(list.insert(1, "b".to_string(), guard));
        assert_eq!(list.snapshot(guard), vec![(1, "b".to_string())]);
    }

    #[test]
    fn dump_lists_every_physical_node() {
        let list = List::new();
        let guard = &pin();
        assert!(list.insert(4, "d".to_string(), guard));
        assert!(list.insert(7, "g".to_string(), guard));

        // Still linked, but its insert was never committed.
        let stalled = list.allocate_desc(&[Operation::Insert(9, "i".to_string())]);
        assert!(matches!(
            list.execute_op(&stalled, 0, guard),
            Step::Done(ReturnCode::Ok, _)
        ));

        let mut out = Vec::new();
        list.dump(&mut out, guard).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Node [0x"));
        assert!(lines[0].ends_with("Key [4] Status [Exist]"));
        assert!(lines[1].ends_with("Key [7] Status [Exist]"));
        assert!(lines[2].ends_with("Key [9] Status [Inexist]"));
    }

    #[test]
    fn reset_metrics_clears_counters() {
        let list = List::new();
        let guard = &pin();
        assert!(list.insert(1, "a".to_string(), guard));
        assert!(!list.insert(1, "b".to_string(), guard));
        assert_eq!(list.stats().count_abort, 1);

        list.reset_metrics();
        assert_eq!(list.stats(), Default::default());
        assert_eq!(list.stats_handle().snapshot().count_commit, 0);
    }
}
