//! Lock-based engine: transactional boosting of a lock-free list.

pub mod list;
pub mod lock_key;
pub mod lockfree_list;

pub use self::list::{BoostError, BoostingList, DEFAULT_LOCK_TIMEOUT};
