use super::session::AllocationSession;
use super::SelectionEntry;
use crate::error::ValidationError;
use crate::ledger::balance::Balance;
use crate::ledger::snapshot::Snapshot;
use crate::ledger::BalanceId;
use crate::money::{is_zero_money, to_money, Amount};

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of an automatic allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoAllocation {
    pub entries: Vec<SelectionEntry>,

    /// What is left of each balance afterwards.
    pub remaining: BTreeMap<BalanceId, Amount>,

    /// Part of the target that the balances couldn't cover.
    pub uncovered: Amount,
}

impl AutoAllocation {
    /// Only a complete allocation may be settled automatically: anything else
    /// would be a silent partial payment.
    pub fn is_complete(&self) -> bool {
        is_zero_money(self.uncovered)
    }
}

/// Spend the oldest balances first until the target is covered.
///
/// This only depends on the snapshot: every balance starts with its full
/// capacity, whatever was selected by hand before.
pub fn auto_allocate(snapshot: &Snapshot, target: Amount) -> AutoAllocation {
    let mut remaining = snapshot.original_remaining_map().clone();
    let mut entries = Vec::new();
    let mut restante = to_money(target).max(Decimal::ZERO);

    for balance in oldest_first(snapshot.balances()) {
        if restante <= Decimal::ZERO || is_zero_money(restante) {
            break;
        }

        let disponible = to_money(remaining.get(&balance.id).copied().unwrap_or_default());
        if disponible <= Decimal::ZERO || is_zero_money(disponible) {
            continue;
        }

        let aplicar = to_money(disponible.min(restante));
        if aplicar <= Decimal::ZERO {
            continue;
        }

        entries.push(SelectionEntry::new(balance.id.clone(), aplicar));
        remaining.insert(balance.id.clone(), to_money(disponible - aplicar));
        restante = to_money(restante - aplicar);
    }

    tracing::debug!(
        owner_id = snapshot.owner_id(),
        %target,
        balances_used = entries.len(),
        uncovered = %restante,
        "automatic allocation done"
    );

    AutoAllocation {
        entries,
        remaining,
        uncovered: restante,
    }
}

// Oldest first, undated balances last. The sort is stable, so balances with
// the same date (or no date) keep the order the ledger returned them in.
fn oldest_first(balances: &[Balance]) -> Vec<&Balance> {
    let mut ordered: Vec<&Balance> = balances.iter().collect();
    ordered.sort_by(|a, b| match (a.created_at, b.created_at) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    ordered
}

impl AllocationSession {
    /// Start a session with the balances picked by `auto_allocate`.
    ///
    /// Check `is_complete` (or `ensure_complete`) before settling it.
    pub fn auto(snapshot: Arc<Snapshot>, target: Amount) -> Result<Self, ValidationError> {
        let mut session = Self::new(snapshot, target)?;
        let allocation = auto_allocate(&session.snapshot, session.target);

        session.entries = allocation.entries;
        session.remaining = allocation.remaining;
        session.debug_check_invariants();

        Ok(session)
    }
}
