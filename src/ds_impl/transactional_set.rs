use crossbeam_ebr::Guard;

use super::stats::StatsSnapshot;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum OpType {
    Find,
    Insert,
    Delete,
}

/// One step of a transaction. A transaction is an ordered slice of these,
/// applied as a single atomic unit.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operation<K, V> {
    Find(K),
    Insert(K, V),
    Delete(K),
}

impl<K, V> Operation<K, V> {
    #[inline]
    pub fn key(&self) -> &K {
        match self {
            Operation::Find(key) | Operation::Insert(key, _) | Operation::Delete(key) => key,
        }
    }

    #[inline]
    pub fn op_type(&self) -> OpType {
        match self {
            Operation::Find(_) => OpType::Find,
            Operation::Insert(..) => OpType::Insert,
            Operation::Delete(_) => OpType::Delete,
        }
    }
}

/// Outcome of a whole transaction.
///
/// The non-blocking engine reports `Ok`, `Skip` or `Fail`; the lock-based
/// engine reports `Ok`, `LockFail` or `OpFail`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ReturnCode {
    /// Committed, and at least one operation mutated the set.
    Ok,
    /// Committed without mutating the set (only `Find`s, or no operations).
    Skip,
    /// Aborted by a conflict, a violated precondition or a helping cycle.
    Fail,
    /// A key lock could not be taken in time. The caller may retry.
    LockFail,
    /// An operation's precondition did not hold; the batch was rolled back.
    OpFail,
}

impl ReturnCode {
    #[inline]
    pub fn is_committed(self) -> bool {
        matches!(self, ReturnCode::Ok | ReturnCode::Skip)
    }

    #[inline]
    pub fn is_retryable(self) -> bool {
        self == ReturnCode::LockFail
    }
}

/// The return code of a transaction together with what its `Find`s observed.
///
/// `reads[i]` is `Some` only if the transaction committed and `ops[i]` is a
/// `Find`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Outcome<V> {
    pub code: ReturnCode,
    pub reads: Vec<Option<V>>,
}

impl<V> Outcome<V> {
    pub fn aborted(code: ReturnCode, size: usize) -> Self {
        debug_assert!(!code.is_committed());
        Outcome {
            code,
            reads: (0..size).map(|_| None).collect(),
        }
    }

    #[inline]
    pub fn is_committed(&self) -> bool {
        self.code.is_committed()
    }
}

/// The uniform entry point the benchmark drives. Both engines implement it.
pub trait TransactionalSet<K, V>
where
    K: Clone,
{
    fn new() -> Self;

    fn execute(&self, ops: &[Operation<K, V>], guard: &Guard) -> Outcome<V>;

    #[inline]
    fn execute_ops(&self, ops: &[Operation<K, V>], guard: &Guard) -> ReturnCode {
        self.execute(ops, guard).code
    }

    fn find(&self, key: &K, guard: &Guard) -> Option<V> {
        let outcome = self.execute(&[Operation::Find(key.clone())], guard);
        outcome.reads.into_iter().next().flatten()
    }

    #[inline]
    fn insert(&self, key: K, value: V, guard: &Guard) -> bool {
        self.execute_ops(&[Operation::Insert(key, value)], guard)
            .is_committed()
    }

    #[inline]
    fn delete(&self, key: &K, guard: &Guard) -> bool {
        self.execute_ops(&[Operation::Delete(key.clone())], guard)
            .is_committed()
    }

    /// Live entries in key order. Only meaningful at a quiescent point.
    fn snapshot(&self, guard: &Guard) -> Vec<(K, V)>;

    /// Dumps every physical node to stdout for debugging.
    fn print(&self, guard: &Guard);

    fn stats(&self) -> StatsSnapshot;
}
