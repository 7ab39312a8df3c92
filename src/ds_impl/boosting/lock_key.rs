use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Ownership of one key's lock. Dropping it unlocks the key.
pub type KeyGuard = ArcMutexGuard<RawMutex, ()>;

/// One timed mutex per key, created on first use and kept for the lifetime
/// of the table.
pub struct LockTable<K> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> Default for LockTable<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LockTable<K>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        LockTable {
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, key: &K) -> Arc<Mutex<()>>
    where
        K: Clone,
    {
        if let Some(lock) = self.locks.get(key) {
            return lock.value().clone();
        }
        self.locks.entry(key.clone()).or_default().value().clone()
    }

    /// Waits at most `timeout` for the lock on `key`.
    pub fn try_lock(&self, key: &K, timeout: Duration) -> Option<KeyGuard>
    where
        K: Clone,
    {
        self.lock_for(key).try_lock_arc_for(timeout)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::LockTable;
    use std::time::Duration;

    #[test]
    fn held_key_times_out() {
        let table = LockTable::new();
        let held = table.try_lock(&1, Duration::from_millis(10)).unwrap();

        assert!(table.try_lock(&1, Duration::from_millis(10)).is_none());
        assert!(table.try_lock(&2, Duration::from_millis(10)).is_some());

        drop(held);
        assert!(table.try_lock(&1, Duration::from_millis(10)).is_some());
        assert_eq!(table.len(), 2);
    }
}
