use super::{BalanceId, OwnerId, Purpose};
use crate::money::{to_money, Amount};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Data the ledger needs back at settlement time, but that allocation never
/// looks at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub card_type: Option<String>,
    pub comment: Option<String>,
}

/// A unit of pre-paid credit owned by an agent, as last read from the ledger.
///
/// Balances are owned by the external ledger: we only read them, and send back
/// how much was consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub id: BalanceId,
    pub owner_id: OwnerId,

    /// Amount the balance was created with.
    pub original_amount: Amount,

    /// What is left in the wallet.
    pub remaining_amount: Amount,

    /// What is left to be invoiced.
    pub billable_amount: Amount,

    /// Only used to order balances for automatic allocation.
    pub created_at: Option<NaiveDateTime>,
    pub is_active: bool,
    pub metadata: Metadata,
}

impl Balance {
    /// How much this balance can contribute when allocating for `purpose`.
    pub fn capacity(&self, purpose: Purpose) -> Amount {
        let raw = match purpose {
            Purpose::Invoice => self.billable_amount,
            Purpose::BalanceApplication | Purpose::Reservation => self.remaining_amount,
        };

        to_money(raw.max(Decimal::ZERO))
    }
}
