use crossbeam_ebr::Shared;

use std::sync::Arc;

use super::descriptor::TxnDesc;
use super::list::Node;

/// A transaction this thread is currently driving, either its own (the
/// bottom frame) or one it is helping.
pub struct Frame<'g, K, V> {
    pub txn: Arc<TxnDesc<K, V>>,
    /// Next operation to perform.
    pub opid: usize,
    pub failed: bool,
    /// Nodes this thread attached descriptors to (or found already attached)
    /// on behalf of `txn`.
    pub touched: Vec<Shared<'g, Node<K, V>>>,
}

impl<'g, K, V> Frame<'g, K, V> {
    fn new(txn: Arc<TxnDesc<K, V>>, opid: usize) -> Self {
        Frame {
            txn,
            opid,
            failed: false,
            touched: Vec::new(),
        }
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.failed || self.opid >= self.txn.size() || !self.txn.is_active()
    }
}

/// Explicit stack of transactions being helped. Helping another transaction
/// pushes a frame instead of recursing, so chains of helping are bounded by
/// heap memory rather than the call stack.
pub struct HelpStack<'g, K, V> {
    frames: Vec<Frame<'g, K, V>>,
}

impl<'g, K, V> HelpStack<'g, K, V> {
    pub fn new(root: Arc<TxnDesc<K, V>>) -> Self {
        HelpStack {
            frames: vec![Frame::new(root, 0)],
        }
    }

    #[cfg(test)]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut Frame<'g, K, V>> {
        self.frames.last_mut()
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Frame<'g, K, V>> {
        self.frames.pop()
    }

    pub fn push(&mut self, txn: Arc<TxnDesc<K, V>>, opid: usize) {
        debug_assert!(self.position(&txn).is_none());
        self.frames.push(Frame::new(txn, opid));
    }

    pub fn position(&self, txn: &Arc<TxnDesc<K, V>>) -> Option<usize> {
        self.frames.iter().position(|f| Arc::ptr_eq(&f.txn, txn))
    }

    #[cfg(test)]
    #[inline]
    pub fn contains(&self, txn: &Arc<TxnDesc<K, V>>) -> bool {
        self.position(txn).is_some()
    }

    /// The frames from `from` to the top wait on each other in turn, and the
    /// top now waits on `from` again. Picks the youngest transaction of that
    /// cycle as the one to abort. Every thread that sees the same cycle picks
    /// the same victim, so the oldest member is never aborted by it.
    pub fn cycle_victim(&self, from: usize) -> usize {
        self.frames[from..]
            .iter()
            .enumerate()
            .max_by_key(|(_, f)| f.txn.id())
            .map_or(from, |(offset, _)| from + offset)
    }

    /// Removes the frame at `at` and every frame above it, returning the one
    /// at `at`. Frames above were helping only on its behalf.
    pub fn unwind_to(&mut self, at: usize) -> Frame<'g, K, V> {
        let mut removed = self.frames.split_off(at);
        removed.swap_remove(0)
    }
}

#[cfg(test)]
mod tests {
    use super::HelpStack;
    use crate::ds_impl::lftt::descriptor::TxnDesc;
    use crate::ds_impl::transactional_set::Operation;
    use std::sync::Arc;

    fn txn(id: u64) -> Arc<TxnDesc<i32, i32>> {
        Arc::new(TxnDesc::new(id, vec![Operation::Find(0)].into_boxed_slice()))
    }

    #[test]
    fn youngest_member_of_cycle_is_victim() {
        let (t5, t9, t7) = (txn(5), txn(9), txn(7));
        let mut stack = HelpStack::new(txn(1));
        stack.push(t5.clone(), 0);
        stack.push(t9.clone(), 1);
        stack.push(t7.clone(), 0);

        assert!(stack.contains(&t5));
        assert_eq!(stack.position(&t9), Some(2));

        // Cycle 5 -> 9 -> 7 -> 5: transaction 9 is the youngest.
        let victim = stack.cycle_victim(1);
        assert_eq!(victim, 2);

        let frame = stack.unwind_to(victim);
        assert!(Arc::ptr_eq(&frame.txn, &t9));
        assert_eq!(frame.opid, 1);
        assert!(!stack.contains(&t7));
        assert!(Arc::ptr_eq(&stack.top_mut().unwrap().txn, &t5));
    }

    #[test]
    fn unwinding_root_empties_stack() {
        let root = txn(3);
        let mut stack = HelpStack::new(root.clone());
        stack.push(txn(2), 0);

        assert_eq!(stack.cycle_victim(0), 0);
        let frame = stack.unwind_to(0);
        assert!(Arc::ptr_eq(&frame.txn, &root));
        assert!(stack.is_empty());
    }
}
