pub mod boosting;
pub mod lftt;
pub mod stats;
pub mod transactional_set;
pub mod traverse;

pub use self::boosting::BoostingList;
pub use self::lftt::TransList;
pub use self::stats::{StatsSnapshot, TxnStats};
pub use self::transactional_set::{OpType, Operation, Outcome, ReturnCode, TransactionalSet};
