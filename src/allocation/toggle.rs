use super::session::AllocationSession;
use super::{AllocationError, SelectionEntry};
use crate::money::{is_zero_money, to_money};

use rust_decimal::Decimal;

impl AllocationSession {
    /// Select a balance if it isn't selected yet, deselect it otherwise.
    ///
    /// Selecting applies as much of the balance as the target still needs.
    /// Deselecting gives the balance back its capacity from the snapshot,
    /// which assumes a balance is only ever selected once per session.
    pub fn toggle(&self, balance_id: &str) -> Result<Self, AllocationError> {
        let original = self
            .snapshot
            .original_remaining(balance_id)
            .ok_or_else(|| AllocationError::UnknownBalance(balance_id.to_string()))?;

        let next = if self.is_selected(balance_id) {
            self.deselect(balance_id, original)
        } else {
            self.select(balance_id)?
        };

        next.debug_check_invariants();
        Ok(next)
    }

    fn deselect(&self, balance_id: &str, original: Decimal) -> Self {
        let mut next = self.clone();
        next.entries.retain(|e| e.balance_id != balance_id);
        next.remaining.insert(balance_id.to_string(), original);

        tracing::debug!(
            balance_id,
            remaining_to_cover = %next.remaining_to_cover(),
            "balance deselected"
        );

        next
    }

    fn select(&self, balance_id: &str) -> Result<Self, AllocationError> {
        let selected = self.selected_total();
        if selected >= self.target || is_zero_money(self.target - selected) {
            return Err(AllocationError::TargetCovered {
                purpose: self.snapshot.purpose(),
            });
        }

        let available = to_money(self.target - selected);
        let remaining = self.remaining(balance_id).unwrap_or_default();
        let to_apply = to_money(remaining.min(available));

        // Nothing left in this balance: there's no point in selecting it.
        if to_apply <= Decimal::ZERO || is_zero_money(to_apply) {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        next.entries.push(SelectionEntry::new(balance_id, to_apply));
        next.remaining
            .insert(balance_id.to_string(), to_money(remaining - to_apply));

        tracing::debug!(
            balance_id,
            applied = %to_apply,
            remaining_to_cover = %next.remaining_to_cover(),
            "balance selected"
        );

        Ok(next)
    }
}
