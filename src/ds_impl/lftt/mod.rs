//! Non-blocking engine: lock-free transactional transformation of a sorted
//! linked list.

pub mod descriptor;
pub mod help_stack;
pub mod list;

pub use self::descriptor::{NodeDesc, TxnDesc, TxnStatus};
pub use self::list::TransList;
