use crossbeam_utils::CachePadded;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic transaction counters shared by an engine and whoever measures it.
///
/// A fake abort is an abort that did not come from a logical conflict: a
/// helping-cycle victim in the non-blocking engine, or a lock timeout in the
/// lock-based one. Fake aborts are also counted in `count_abort`.
#[derive(Debug, Default)]
pub struct TxnStats {
    commit: CachePadded<AtomicU64>,
    abort: CachePadded<AtomicU64>,
    fake_abort: CachePadded<AtomicU64>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StatsSnapshot {
    pub count_commit: u64,
    pub count_abort: u64,
    pub count_fake_abort: u64,
}

impl TxnStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_commit(&self) {
        self.commit.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_abort(&self, fake: bool) {
        self.abort.fetch_add(1, Ordering::Relaxed);
        if fake {
            self.fake_abort.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            count_commit: self.commit.load(Ordering::Relaxed),
            count_abort: self.abort.load(Ordering::Relaxed),
            count_fake_abort: self.fake_abort.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.commit.store(0, Ordering::Relaxed);
        self.abort.store(0, Ordering::Relaxed);
        self.fake_abort.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "commit: {}, abort (total/fake): {}/{}",
            self.count_commit, self.count_abort, self.count_fake_abort
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{StatsSnapshot, TxnStats};

    #[test]
    fn counts_and_resets() {
        let stats = TxnStats::new();
        stats.record_commit();
        stats.record_abort(false);
        stats.record_abort(true);
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                count_commit: 1,
                count_abort: 2,
                count_fake_abort: 1,
            }
        );
        assert_eq!(
            stats.snapshot().to_string(),
            "commit: 1, abort (total/fake): 2/1"
        );

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
