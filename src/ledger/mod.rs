pub mod balance;
pub mod snapshot;

// Using named types doesn't provide any compiler help, but it helps a lot with
// readability.
// Consider the following, when creating the remaining capacities map:
// (1) remaining: BTreeMap<String, Decimal>
// (2) remaining: BTreeMap<BalanceId, Amount>
// Implementation (1) would most likely need comments, and could be confusing.
// Implementation (2) is self-explanatory.
//
// The backend sends both numeric and string ids, so they are kept opaque.
pub type BalanceId = String;
pub type OwnerId = String;

/// What a set of balances is being allocated for.
///
/// It decides which capacity a balance starts with, the wording shown when the
/// target is already covered, and which settlement endpoint is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Free-standing payment from the agent's wallet.
    BalanceApplication,

    /// Paying (part of) a reservation.
    Reservation,

    /// Assigning payments to an invoice. Balances contribute their billable
    /// amount instead of their wallet balance.
    Invoice,
}

impl Purpose {
    pub fn limit_notice(self) -> &'static str {
        match self {
            Purpose::Reservation => "reservation already fully paid",
            Purpose::BalanceApplication | Purpose::Invoice => "balance already fully used",
        }
    }
}
