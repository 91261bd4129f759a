use crate::allocation::AllocationError;
use crate::api::FetchError;
use crate::config::ConfigError;
use crate::input;
use crate::ledger::Purpose;
use crate::money::Amount;
use crate::settlement::SettlementError;

use thiserror::Error;

/// Problems caught before anything is sent to the backend.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("target amount {0} is negative")]
    NegativeTarget(Amount),

    #[error("amount {0} must be greater than zero")]
    NonPositiveAmount(Amount),

    #[error("an agent id is required")]
    MissingOwner,

    #[error("a reservation id is required")]
    MissingReservation,

    #[error("no balance was selected")]
    EmptySelection,

    #[error("a reservation needs at least one night")]
    NoNights,

    /// Capacities depend on the purpose: balances loaded for an invoice can't
    /// pay a reservation.
    #[error("balances loaded for {loaded:?} can't settle a {target:?} payment")]
    PurposeMismatch { loaded: Purpose, target: Purpose },

    /// The new price is too low to be charged on credit.
    #[error("nightly price {nightly} is below the minimum of {minimum}")]
    BelowMinimumPrice { nightly: Amount, minimum: Amount },
}

/// Every error the crate can return. Callers usually show it to the user as
/// is: nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read balances: {0}")]
    Input(#[from] input::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
