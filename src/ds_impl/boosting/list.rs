use crossbeam_ebr::Guard;
use scopeguard::ScopeGuard;
use thiserror::Error;
use tracing::{debug, trace, warn};

use std::fmt::Debug;
use std::io::{self, stdout, Write};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use super::lock_key::{KeyGuard, LockTable};
use super::lockfree_list::LockFreeList;
use crate::ds_impl::stats::{StatsSnapshot, TxnStats};
use crate::ds_impl::transactional_set::{
    OpType, Operation, Outcome, ReturnCode, TransactionalSet,
};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoostError {
    #[error("key lock not acquired within {0:?}")]
    LockTimeout(Duration),
    #[error("operation {0} failed its precondition")]
    Precondition(usize),
}

impl BoostError {
    pub fn return_code(&self) -> ReturnCode {
        match self {
            BoostError::LockTimeout(_) => ReturnCode::LockFail,
            BoostError::Precondition(_) => ReturnCode::OpFail,
        }
    }
}

/// Inverse of an applied operation.
enum Undo<K, V> {
    Remove(K),
    Reinsert(K, V),
}

/// Transaction-private state: the key locks it holds and how to take back
/// what it did.
struct BoostTxn<'a, K, V> {
    set: &'a BoostingList<K, V>,
    guard: &'a Guard,
    locks: Vec<KeyGuard>,
    undo: Vec<Undo<K, V>>,
}

impl<'a, K, V> BoostTxn<'a, K, V>
where
    K: Ord + Hash + Clone,
    V: Clone,
{
    /// Locks every distinct key of `ops` in ascending order.
    fn lock_keys(&mut self, ops: &[Operation<K, V>]) -> Result<(), BoostError> {
        let mut keys: Vec<&K> = ops.iter().map(Operation::key).collect();
        keys.sort();
        keys.dedup();

        for key in keys {
            let lock = self
                .set
                .locks
                .try_lock(key, self.set.lock_timeout)
                .ok_or(BoostError::LockTimeout(self.set.lock_timeout))?;
            self.locks.push(lock);
        }
        Ok(())
    }

    fn apply(&mut self, opid: usize, op: &Operation<K, V>) -> Result<Option<V>, BoostError> {
        let list = &self.set.list;
        match op {
            Operation::Insert(key, value) => {
                if !list.insert(key.clone(), value.clone(), self.guard) {
                    return Err(BoostError::Precondition(opid));
                }
                self.undo.push(Undo::Remove(key.clone()));
                Ok(None)
            }
            Operation::Delete(key) => {
                let old = list
                    .remove(key, self.guard)
                    .ok_or(BoostError::Precondition(opid))?;
                self.undo.push(Undo::Reinsert(key.clone(), old));
                Ok(None)
            }
            Operation::Find(key) => list
                .get(key, self.guard)
                .cloned()
                .map(Some)
                .ok_or(BoostError::Precondition(opid)),
        }
    }

    fn on_commit(mut self) {
        self.undo.clear();
        self.locks.clear();
    }

    /// Replays the undo log newest first, then releases the locks. Every key
    /// is still locked by us, so each inverse must succeed.
    fn on_abort(&mut self) {
        let list = &self.set.list;
        while let Some(undo) = self.undo.pop() {
            let restored = match undo {
                Undo::Remove(key) => list.remove(&key, self.guard).is_some(),
                Undo::Reinsert(key, value) => list.insert(key, value, self.guard),
            };
            assert!(restored, "undo of a locked key failed");
        }
        self.locks.clear();
    }
}

/// Lock-based transactional set: a lock-free list boosted with per-key locks
/// and an undo log.
pub struct BoostingList<K, V> {
    list: LockFreeList<K, V>,
    locks: LockTable<K>,
    lock_timeout: Duration,
    stats: Arc<TxnStats>,
}

impl<K, V> BoostingList<K, V>
where
    K: Ord + Hash + Clone,
    V: Clone,
{
    pub fn with_stats(stats: Arc<TxnStats>) -> Self {
        BoostingList {
            list: LockFreeList::new(),
            locks: LockTable::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            stats,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn stats_handle(&self) -> Arc<TxnStats> {
        self.stats.clone()
    }

    pub fn reset_metrics(&self) {
        self.stats.reset();
    }

    /// Runs `ops` under their key locks. Leaving early for any reason,
    /// unwinding included, rolls back through `on_abort`.
    pub fn try_execute(
        &self,
        ops: &[Operation<K, V>],
        guard: &Guard,
    ) -> Result<Vec<Option<V>>, BoostError> {
        let txn = BoostTxn {
            set: self,
            guard,
            locks: Vec::with_capacity(ops.len()),
            undo: Vec::with_capacity(ops.len()),
        };
        let mut txn = scopeguard::guard(txn, |mut txn| txn.on_abort());

        txn.lock_keys(ops)?;
        let mut reads = Vec::with_capacity(ops.len());
        for (opid, op) in ops.iter().enumerate() {
            reads.push(txn.apply(opid, op)?);
        }

        ScopeGuard::into_inner(txn).on_commit();
        Ok(reads)
    }

    pub fn dump<W: Write>(&self, out: &mut W, guard: &Guard) -> io::Result<()>
    where
        K: Debug,
    {
        let mut result = Ok(());
        self.list.for_each(guard, |k, _| {
            if result.is_ok() {
                result = writeln!(out, "Key [{:?}] Status [Exist]", k);
            }
        });
        result
    }
}

impl<K, V> TransactionalSet<K, V> for BoostingList<K, V>
where
    K: Ord + Hash + Clone + Debug,
    V: Clone,
{
    fn new() -> Self {
        Self::with_stats(Arc::new(TxnStats::new()))
    }

    fn execute(&self, ops: &[Operation<K, V>], guard: &Guard) -> Outcome<V> {
        match self.try_execute(ops, guard) {
            Ok(reads) => {
                self.stats.record_commit();
                trace!(size = ops.len(), "committed");
                let code = if ops.iter().all(|op| op.op_type() == OpType::Find) {
                    ReturnCode::Skip
                } else {
                    ReturnCode::Ok
                };
                Outcome { code, reads }
            }
            Err(e) => {
                let code = e.return_code();
                match e {
                    BoostError::LockTimeout(_) => {
                        self.stats.record_abort(true);
                        debug!("{}", e);
                    }
                    BoostError::Precondition(_) => {
                        self.stats.record_abort(false);
                        trace!("{}", e);
                    }
                }
                Outcome::aborted(code, ops.len())
            }
        }
    }

    fn snapshot(&self, guard: &Guard) -> Vec<(K, V)> {
        let mut entries = Vec::new();
        self.list
            .for_each(guard, |k, v| entries.push((k.clone(), v.clone())));
        entries
    }

    fn print(&self, guard: &Guard) {
        if let Err(e) = self.dump(&mut stdout().lock(), guard) {
            warn!("cannot print the set: {}", e);
        }
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
