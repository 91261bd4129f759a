//! Reservation price changes.
//!
//! When the price of a paid reservation changes, the difference has to be
//! settled: refunded when the price goes down, charged when it goes up. How it
//! is settled depends on how the reservation was paid.

use crate::api::Endpoint;
use crate::error::ValidationError;
use crate::ledger::OwnerId;
use crate::money::{is_zero_money, serde_money, to_money, Amount};

use reqwest::Method;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    /// `updated - previous`, negative when the price went down.
    pub difference: Amount,
    pub direction: Direction,
}

pub fn compute_adjustment(previous_total: Amount, updated_total: Amount) -> Adjustment {
    let difference = to_money(to_money(updated_total) - to_money(previous_total));

    let direction = if is_zero_money(difference) {
        Direction::None
    } else if difference > Decimal::ZERO {
        Direction::Increase
    } else {
        Direction::Decrease
    };

    Adjustment {
        difference,
        direction,
    }
}

/// How the reservation was originally paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Charged to the agent's credit line.
    Credit,

    /// Anything else: wallet balance, card, transfer...
    Other(String),
}

impl PaymentMethod {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "credito" | "crédito" | "credit" => PaymentMethod::Credit,
            other => PaymentMethod::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePolicy {
    pub minimum_nightly_price: Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceChange {
    pub reservation_id: String,
    pub owner_id: OwnerId,
    pub previous_total: Amount,
    pub updated_total: Amount,
    pub nights: u32,
    pub payment_method: PaymentMethod,
}

/// What has to happen for a price change to be settled.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementPath {
    /// Same price: only the new total is saved.
    None,

    /// Give back a credit charge.
    RefundCredit { amount: Amount },

    /// Give the money back to the agent's wallet, and lower the original
    /// payment by the same amount.
    RefundToWallet { amount: Amount },

    /// Charge the difference to the agent's credit line.
    ChargeCredit { amount: Amount },

    /// Pay the difference with the agent's balances.
    AllocateBalances { target: Amount },
}

/// Decide how a price change is settled.
///
/// Every check happens here, before anything is sent: a change that fails
/// validation must not settle anything.
pub fn route(
    change: &PriceChange,
    policy: &PricePolicy,
) -> Result<(Adjustment, SettlementPath), ValidationError> {
    if change.reservation_id.trim().is_empty() {
        return Err(ValidationError::MissingReservation);
    }
    if change.owner_id.trim().is_empty() {
        return Err(ValidationError::MissingOwner);
    }

    let adjustment = compute_adjustment(change.previous_total, change.updated_total);
    let amount = adjustment.difference.abs();

    let path = match (adjustment.direction, &change.payment_method) {
        (Direction::None, _) => SettlementPath::None,
        (Direction::Decrease, PaymentMethod::Credit) => SettlementPath::RefundCredit { amount },
        (Direction::Decrease, PaymentMethod::Other(_)) => SettlementPath::RefundToWallet { amount },
        (Direction::Increase, PaymentMethod::Credit) => {
            check_minimum_price(change, policy)?;
            SettlementPath::ChargeCredit { amount }
        }
        (Direction::Increase, PaymentMethod::Other(_)) => {
            SettlementPath::AllocateBalances { target: amount }
        }
    };

    Ok((adjustment, path))
}

fn check_minimum_price(change: &PriceChange, policy: &PricePolicy) -> Result<(), ValidationError> {
    if change.nights == 0 {
        return Err(ValidationError::NoNights);
    }

    let nightly = to_money(change.updated_total / Decimal::from(change.nights));
    let minimum = to_money(policy.minimum_nightly_price);
    if nightly < minimum {
        return Err(ValidationError::BelowMinimumPrice { nightly, minimum });
    }

    Ok(())
}

/// Requests for the paths that don't go through balance allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tipo")]
pub enum AdjustmentRequest {
    #[serde(rename = "reembolso_credito")]
    CreditRefund {
        #[serde(rename = "id_reserva")]
        reservation_id: String,
        #[serde(rename = "id_agente")]
        owner_id: OwnerId,
        #[serde(rename = "monto", serialize_with = "serde_money::serialize")]
        amount: Amount,
    },

    #[serde(rename = "reembolso_saldo")]
    WalletRefund {
        #[serde(rename = "id_reserva")]
        reservation_id: String,
        #[serde(rename = "id_agente")]
        owner_id: OwnerId,
        /// Credited back to the agent's wallet.
        #[serde(rename = "monto_a_saldo", serialize_with = "serde_money::serialize")]
        to_wallet: Amount,
        /// Taken off the original payment record.
        #[serde(rename = "monto_descontado_pago", serialize_with = "serde_money::serialize")]
        payment_decrement: Amount,
    },

    #[serde(rename = "cargo_credito")]
    CreditCharge {
        #[serde(rename = "id_reserva")]
        reservation_id: String,
        #[serde(rename = "id_agente")]
        owner_id: OwnerId,
        #[serde(rename = "monto", serialize_with = "serde_money::serialize")]
        amount: Amount,
    },
}

impl AdjustmentRequest {
    /// The request for a path, if the path is settled with a single request.
    pub fn for_path(change: &PriceChange, path: &SettlementPath) -> Option<Self> {
        let reservation_id = change.reservation_id.clone();
        let owner_id = change.owner_id.clone();

        match *path {
            SettlementPath::RefundCredit { amount } => Some(AdjustmentRequest::CreditRefund {
                reservation_id,
                owner_id,
                amount,
            }),
            SettlementPath::RefundToWallet { amount } => Some(AdjustmentRequest::WalletRefund {
                reservation_id,
                owner_id,
                to_wallet: amount,
                payment_decrement: amount,
            }),
            SettlementPath::ChargeCredit { amount } => Some(AdjustmentRequest::CreditCharge {
                reservation_id,
                owner_id,
                amount,
            }),
            SettlementPath::None | SettlementPath::AllocateBalances { .. } => None,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        let (reservation_id, action) = match self {
            AdjustmentRequest::CreditRefund { reservation_id, .. } => (reservation_id, ["credito", "reembolso"]),
            AdjustmentRequest::WalletRefund { reservation_id, .. } => (reservation_id, ["saldo", "reembolso"]),
            AdjustmentRequest::CreditCharge { reservation_id, .. } => (reservation_id, ["credito", "cargo"]),
        };

        Endpoint::new(
            Method::POST,
            ["reservas", reservation_id.as_str(), action[0], action[1]],
        )
    }
}
