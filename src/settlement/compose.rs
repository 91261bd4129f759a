use super::{SettlementLine, SettlementPayload, SettlementTarget};
use crate::allocation::session::AllocationSession;
use crate::allocation::{AllocationError, SelectionEntry};
use crate::error::{Result, ValidationError};
use crate::ledger::snapshot::Snapshot;
use crate::ledger::BalanceId;
use crate::money::{sum_money, to_money, Amount};

use std::collections::BTreeMap;

/// Turn a finished session into the payload the ledger expects.
///
/// The session must cover its target: partial payments are never sent.
pub fn compose(session: &AllocationSession, target: SettlementTarget) -> Result<SettlementPayload> {
    session.ensure_complete()?;
    if session.entries().is_empty() {
        return Err(ValidationError::EmptySelection.into());
    }

    let snapshot = session.snapshot();
    if snapshot.owner_id().trim().is_empty() {
        return Err(ValidationError::MissingOwner.into());
    }

    if target.purpose() != snapshot.purpose() {
        return Err(ValidationError::PurposeMismatch {
            loaded: snapshot.purpose(),
            target: target.purpose(),
        }
        .into());
    }

    let lines = compose_lines(session.entries(), snapshot, session.remaining_map())?;
    let total = sum_money(lines.iter().map(|l| l.applied));

    Ok(SettlementPayload {
        target,
        owner_id: snapshot.owner_id().to_string(),
        total,
        lines,
    })
}

/// One line per selected balance.
///
/// The applied amount is always what the balance lost (`original - remaining`),
/// and never the amount recorded when it was selected. Both should agree, but
/// if rounding ever made them drift, the ledger must see what the balances
/// actually lost.
pub fn compose_lines(
    entries: &[SelectionEntry],
    snapshot: &Snapshot,
    remaining: &BTreeMap<BalanceId, Amount>,
) -> std::result::Result<Vec<SettlementLine>, AllocationError> {
    entries
        .iter()
        .map(|entry| {
            let unknown = || AllocationError::UnknownBalance(entry.balance_id.clone());

            let balance = snapshot.get(&entry.balance_id).ok_or_else(unknown)?;
            let original = snapshot
                .original_remaining(&entry.balance_id)
                .ok_or_else(unknown)?;
            let left = remaining
                .get(&entry.balance_id)
                .copied()
                .ok_or_else(unknown)?;

            Ok(SettlementLine {
                balance_id: balance.id.clone(),
                original: to_money(original),
                remaining: to_money(left),
                applied: to_money(original - left),
                owner_id: snapshot.owner_id().to_string(),
                payment_method: balance.metadata.payment_method.clone(),
                reference: balance.metadata.reference.clone(),
                comment: balance.metadata.comment.clone(),
                card_type: balance.metadata.card_type.clone(),
            })
        })
        .collect()
}
