use once_cell::sync::OnceCell;

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::ds_impl::transactional_set::{OpType, Operation};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum TxnStatus {
    Active = 0,
    Committed = 1,
    Aborted = 2,
}

impl TxnStatus {
    #[inline]
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TxnStatus::Active,
            1 => TxnStatus::Committed,
            2 => TxnStatus::Aborted,
            _ => unreachable!("invalid transaction status {}", v),
        }
    }
}

/// Transaction descriptor: the operator queue of one transaction and its
/// status.
///
/// Every thread that meets the transaction on a node may read the queue and
/// help it. Helpers only ever write `status` (once, by CAS) and the
/// write-once read and effect slots.
pub struct TxnDesc<K, V> {
    id: u64,
    status: AtomicU8,
    ops: Box<[Operation<K, V>]>,
    reads: Box<[OnceCell<V>]>,
    /// Address of the node each `Insert` took effect on, 0 until known.
    effects: Box<[AtomicUsize]>,
}

impl<K, V> TxnDesc<K, V> {
    pub fn new(id: u64, ops: Box<[Operation<K, V>]>) -> Self {
        let reads = ops.iter().map(|_| OnceCell::new()).collect();
        let effects = ops.iter().map(|_| AtomicUsize::new(0)).collect();
        TxnDesc {
            id,
            status: AtomicU8::new(TxnStatus::Active as u8),
            ops,
            reads,
            effects,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn op(&self, opid: usize) -> &Operation<K, V> {
        &self.ops[opid]
    }

    #[inline]
    pub fn status(&self) -> TxnStatus {
        TxnStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status() == TxnStatus::Active
    }

    /// Moves the status from `Active` to `to`. Only the first caller wins;
    /// everyone else adopts its outcome.
    #[inline]
    pub fn finalize(&self, to: TxnStatus) -> bool {
        debug_assert_ne!(to, TxnStatus::Active);
        self.status
            .compare_exchange(
                TxnStatus::Active as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Publishes what the `Find` at `opid` observed. Later writers race with
    /// the first one and always carry the same value, so losing is fine.
    #[inline]
    pub fn record_read(&self, opid: usize, value: V) {
        debug_assert_eq!(self.ops[opid].op_type(), OpType::Find);
        let _ = self.reads[opid].set(value);
    }

    #[inline]
    pub fn read(&self, opid: usize) -> Option<&V> {
        self.reads[opid].get()
    }

    /// Records the node the `Insert` at `opid` took effect on. Every insert
    /// is recorded before the transaction can commit; the first record wins.
    #[inline]
    pub fn record_effect(&self, opid: usize, node: usize) {
        debug_assert_eq!(self.ops[opid].op_type(), OpType::Insert);
        let _ = self.effects[opid].compare_exchange(0, node, Ordering::AcqRel, Ordering::Acquire);
    }

    #[inline]
    pub fn effect(&self, opid: usize) -> usize {
        self.effects[opid].load(Ordering::Acquire)
    }
}

/// Node descriptor: which operation of which transaction last touched a node,
/// and what the node holds depending on how that transaction ends.
pub struct NodeDesc<K, V> {
    pub txn: Arc<TxnDesc<K, V>>,
    pub opid: usize,
    /// Content if `txn` aborts.
    before: Option<V>,
    /// Content once `txn` commits.
    after: Option<V>,
}

impl<K, V> NodeDesc<K, V> {
    pub fn new(txn: Arc<TxnDesc<K, V>>, opid: usize, before: Option<V>, after: Option<V>) -> Self {
        NodeDesc {
            txn,
            opid,
            before,
            after,
        }
    }

    #[inline]
    pub fn op_type(&self) -> OpType {
        self.txn.op(self.opid).op_type()
    }

    #[inline]
    pub fn is_owned_by(&self, txn: &Arc<TxnDesc<K, V>>) -> bool {
        Arc::ptr_eq(&self.txn, txn)
    }

    /// Whether the owning transaction committed.
    #[inline]
    pub fn is_node_active(&self) -> bool {
        self.txn.status() == TxnStatus::Committed
    }

    #[inline]
    pub fn is_same_operation(&self, txn: &Arc<TxnDesc<K, V>>, opid: usize) -> bool {
        self.is_owned_by(txn) && self.opid == opid
    }

    /// The operation at `opid` was already applied to this node by some
    /// thread: either this descriptor is for it, or for a later operation of
    /// the same transaction, which cannot run before `opid` is done.
    #[inline]
    pub fn is_done(&self, txn: &Arc<TxnDesc<K, V>>, opid: usize) -> bool {
        self.is_owned_by(txn) && self.opid >= opid
    }

    /// Node content as seen from `viewer`. A transaction sees its own
    /// uncommitted effects; everyone else sees the pre-transaction content
    /// until the owner commits.
    pub fn content(&self, viewer: Option<&Arc<TxnDesc<K, V>>>) -> Option<&V> {
        match self.txn.status() {
            TxnStatus::Committed => self.after.as_ref(),
            TxnStatus::Aborted => self.before.as_ref(),
            TxnStatus::Active => {
                if viewer.map_or(false, |v| self.is_owned_by(v)) {
                    self.after.as_ref()
                } else {
                    self.before.as_ref()
                }
            }
        }
    }

    #[inline]
    pub fn after(&self) -> Option<&V> {
        self.after.as_ref()
    }

    #[inline]
    pub fn is_key_exist(&self, viewer: &Arc<TxnDesc<K, V>>) -> bool {
        self.content(Some(viewer)).is_some()
    }

    /// Content to restore should `txn` abort after replacing this descriptor.
    /// Callers only replace terminal foreign descriptors or their own.
    pub fn baseline(&self, txn: &Arc<TxnDesc<K, V>>) -> Option<V>
    where
        V: Clone,
    {
        if self.is_owned_by(txn) {
            self.before.clone()
        } else {
            debug_assert!(!self.txn.is_active());
            self.content(None).cloned()
        }
    }
}
