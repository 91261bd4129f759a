use super::balance::Balance;
use super::{BalanceId, OwnerId, Purpose};
use crate::money::{is_zero_money, sum_money, Amount};

use std::collections::BTreeMap;

/// The balances an agent can spend, as read once from the ledger.
///
/// A snapshot never changes after it's built: allocation sessions keep their
/// own `remaining` map and only read the starting capacities from here.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    owner_id: OwnerId,
    purpose: Purpose,

    // Kept in the order the ledger returned them.
    balances: Vec<Balance>,

    // Capacity of each balance when the snapshot was taken.
    original_remaining: BTreeMap<BalanceId, Amount>,
}

impl Snapshot {
    /// Build a snapshot, leaving out everything that can't be spent: inactive
    /// balances, and balances with nothing left for this purpose.
    pub fn new(
        owner_id: impl Into<OwnerId>,
        purpose: Purpose,
        balances: impl IntoIterator<Item = Balance>,
    ) -> Self {
        let mut kept = Vec::new();
        let mut original_remaining = BTreeMap::new();

        for balance in balances {
            if !balance.is_active {
                continue;
            }

            let capacity = balance.capacity(purpose);
            if is_zero_money(capacity) {
                continue;
            }

            if original_remaining.contains_key(&balance.id) {
                tracing::warn!(balance_id = %balance.id, "duplicate balance in snapshot, keeping the first one");
                continue;
            }

            original_remaining.insert(balance.id.clone(), capacity);
            kept.push(balance);
        }

        Self {
            owner_id: owner_id.into(),
            purpose,
            balances: kept,
            original_remaining,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    pub fn balances(&self) -> &[Balance] {
        &self.balances
    }

    pub fn get(&self, id: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.id == id)
    }

    /// Capacity of a balance when the snapshot was taken.
    pub fn original_remaining(&self, id: &str) -> Option<Amount> {
        self.original_remaining.get(id).copied()
    }

    pub fn original_remaining_map(&self) -> &BTreeMap<BalanceId, Amount> {
        &self.original_remaining
    }

    /// Sum of all capacities.
    pub fn total_capacity(&self) -> Amount {
        sum_money(self.original_remaining.values().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Snapshot;
    use crate::ledger::balance::fixtures::balance;
    use crate::ledger::Purpose;

    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_filters_unusable_balances() {
        let mut inactive = balance("inactive", dec!(50), None);
        inactive.is_active = false;

        let mut empty = balance("empty", dec!(50), None);
        empty.remaining_amount = dec!(0.004);

        let snapshot = Snapshot::new(
            "agent-1",
            Purpose::BalanceApplication,
            vec![balance("A", dec!(150), None), inactive, empty, balance("B", dec!(100), None)],
        );

        let ids: Vec<&str> = snapshot.balances().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(vec!["A", "B"], ids);
        assert_eq!(Some(dec!(150)), snapshot.original_remaining("A"));
        assert_eq!(None, snapshot.original_remaining("empty"));
        assert_eq!(dec!(250), snapshot.total_capacity());
    }

    #[test]
    fn test_invoice_snapshot_uses_billable_amount() {
        let mut a = balance("A", dec!(150), None);
        a.billable_amount = dec!(20);
        let mut b = balance("B", dec!(100), None);
        b.billable_amount = dec!(0);

        let snapshot = Snapshot::new("agent-1", Purpose::Invoice, vec![a, b]);

        assert_eq!(1, snapshot.balances().len());
        assert_eq!(Some(dec!(20)), snapshot.original_remaining("A"));
    }

    #[test]
    fn test_duplicate_balances_keep_the_first() {
        let mut second = balance("A", dec!(999), None);
        second.metadata.reference = Some("duplicate".to_string());

        let snapshot = Snapshot::new(
            "agent-1",
            Purpose::Reservation,
            vec![balance("A", dec!(10), None), second],
        );

        assert_eq!(1, snapshot.balances().len());
        assert_eq!(Some(dec!(10)), snapshot.original_remaining("A"));
    }

    #[test]
    fn test_total_capacity_does_not_overflow() {
        let snapshot = Snapshot::new(
            "agent-1",
            Purpose::Reservation,
            vec![
                balance("A", rust_decimal::Decimal::MAX, None),
                balance("B", rust_decimal::Decimal::MAX, None),
            ],
        );

        assert_eq!(2, snapshot.balances().len());
        assert_eq!(rust_decimal::Decimal::MAX, snapshot.total_capacity());
    }
}
