use super::{AllocationError, SelectionEntry};
use crate::error::ValidationError;
use crate::ledger::snapshot::Snapshot;
use crate::ledger::BalanceId;
use crate::money::{is_zero_money, sum_money, to_money, Amount};

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Allocation of a snapshot's balances against a target amount.
///
/// A session is a value: `toggle` and `auto` never modify it, they return
/// the next session. Callers can keep the previous one around to inspect it,
/// or to go back to it. The snapshot is shared between all of them.
///
/// A session lives as long as the dialog that opened it: when the target
/// changes, start a new one instead of trying to update this one.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationSession {
    pub(super) snapshot: Arc<Snapshot>,
    pub(super) target: Amount,

    // What is left of each balance after this session's selections.
    pub(super) remaining: BTreeMap<BalanceId, Amount>,

    // In selection order.
    pub(super) entries: Vec<SelectionEntry>,
}

impl AllocationSession {
    /// Start an empty session. Every balance starts with its full capacity.
    pub fn new(snapshot: Arc<Snapshot>, target: Amount) -> Result<Self, ValidationError> {
        let target = to_money(target);
        if target < Decimal::ZERO && !is_zero_money(target) {
            return Err(ValidationError::NegativeTarget(target));
        }

        let remaining = snapshot.original_remaining_map().clone();

        Ok(Self {
            snapshot,
            target: target.max(Decimal::ZERO),
            remaining,
            entries: Vec::new(),
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn target(&self) -> Amount {
        self.target
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    pub fn remaining(&self, id: &str) -> Option<Amount> {
        self.remaining.get(id).copied()
    }

    pub fn remaining_map(&self) -> &BTreeMap<BalanceId, Amount> {
        &self.remaining
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.balance_id == id)
    }

    /// Sum of everything applied so far.
    pub fn selected_total(&self) -> Amount {
        sum_money(self.entries.iter().map(|e| e.applied_amount))
    }

    /// What still has to be covered by other balances.
    pub fn remaining_to_cover(&self) -> Amount {
        to_money(self.target - self.selected_total())
    }

    pub fn is_complete(&self) -> bool {
        is_zero_money(self.remaining_to_cover())
    }

    /// A settlement can only be sent once the target is fully covered.
    pub fn ensure_complete(&self) -> Result<(), AllocationError> {
        let uncovered = self.remaining_to_cover();
        if uncovered > Decimal::ZERO && !is_zero_money(uncovered) {
            return Err(AllocationError::Incomplete { uncovered });
        }

        Ok(())
    }

    // Applying more than the target is a bug in the allocators, never a user error.
    pub(super) fn debug_check_invariants(&self) {
        debug_assert!(
            self.remaining_to_cover() >= Decimal::new(-1, 2),
            "allocated {} over a target of {}",
            self.selected_total(),
            self.target
        );
        debug_assert!(
            self.remaining.values().all(|r| *r >= Decimal::ZERO),
            "a balance was consumed past its capacity"
        );
    }
}
