pub mod auto;
pub mod session;
pub mod toggle;

use crate::ledger::{BalanceId, Purpose};
use crate::money::Amount;

use thiserror::Error;

/// A portion of a balance applied to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEntry {
    pub balance_id: BalanceId,
    pub applied_amount: Amount,
}

impl SelectionEntry {
    pub fn new(balance_id: impl Into<BalanceId>, applied_amount: Amount) -> Self {
        Self {
            balance_id: balance_id.into(),
            applied_amount,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    /// The target is already covered, so nothing else can be selected.
    #[error("{}", .purpose.limit_notice())]
    TargetCovered { purpose: Purpose },

    /// The balance isn't part of the snapshot the session was built from.
    #[error("unknown balance {0}")]
    UnknownBalance(BalanceId),

    /// Selected balances don't cover the target yet.
    #[error("selected balances leave {uncovered} uncovered")]
    Incomplete { uncovered: Amount },
}
