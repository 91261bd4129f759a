//! What gets sent to the ledger once an allocation is final.

pub mod compose;

use crate::api::Endpoint;
use crate::ledger::{BalanceId, OwnerId, Purpose};
use crate::money::{serde_money, Amount};

use reqwest::Method;
use serde::Serialize;
use thiserror::Error;

/// Shown when the ledger refuses a settlement without telling us why.
pub const GENERIC_SETTLEMENT_FAILURE: &str = "the settlement could not be completed";

#[derive(Debug, Error, PartialEq)]
pub enum SettlementError {
    /// The request never got an answer.
    #[error("could not reach the ledger: {0}")]
    Transport(String),

    /// The ledger answered, and said no.
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl From<reqwest::Error> for SettlementError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// What an allocation pays for. Each target is settled through its own
/// endpoint, with a slightly different payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tipo")]
pub enum SettlementTarget {
    #[serde(rename = "aplicar_saldo")]
    BalanceApplication,

    #[serde(rename = "pago_reserva")]
    Reservation {
        #[serde(rename = "id_reserva")]
        reservation_id: String,
    },

    #[serde(rename = "pago_factura")]
    Invoice {
        #[serde(rename = "id_factura")]
        invoice_id: String,
    },
}

impl SettlementTarget {
    pub fn purpose(&self) -> Purpose {
        match self {
            SettlementTarget::BalanceApplication => Purpose::BalanceApplication,
            SettlementTarget::Reservation { .. } => Purpose::Reservation,
            SettlementTarget::Invoice { .. } => Purpose::Invoice,
        }
    }

    /// HTTP method and path, relative to the API base URL.
    pub fn endpoint(&self) -> Endpoint {
        match self {
            SettlementTarget::BalanceApplication => {
                Endpoint::new(Method::POST, ["saldos", "aplicar"])
            }
            SettlementTarget::Reservation { reservation_id } => Endpoint::new(
                Method::PATCH,
                ["reservas", reservation_id.as_str(), "pagos", "saldo"],
            ),
            SettlementTarget::Invoice { invoice_id } => {
                Endpoint::new(Method::POST, ["facturas", invoice_id.as_str(), "pagos"])
            }
        }
    }
}

/// How much of one balance was used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementLine {
    #[serde(rename = "id_saldos")]
    pub balance_id: BalanceId,

    #[serde(rename = "saldo_original", serialize_with = "serde_money::serialize")]
    pub original: Amount,

    #[serde(rename = "saldo_restante", serialize_with = "serde_money::serialize")]
    pub remaining: Amount,

    #[serde(rename = "monto_aplicado", serialize_with = "serde_money::serialize")]
    pub applied: Amount,

    #[serde(rename = "id_agente")]
    pub owner_id: OwnerId,

    #[serde(rename = "metodo_pago")]
    pub payment_method: Option<String>,

    #[serde(rename = "referencia")]
    pub reference: Option<String>,

    #[serde(rename = "comentario")]
    pub comment: Option<String>,

    #[serde(rename = "tipo_tarjeta")]
    pub card_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementPayload {
    #[serde(flatten)]
    pub target: SettlementTarget,

    #[serde(rename = "id_agente")]
    pub owner_id: OwnerId,

    #[serde(rename = "monto_total", serialize_with = "serde_money::serialize")]
    pub total: Amount,

    #[serde(rename = "saldos")]
    pub lines: Vec<SettlementLine>,
}

/// The ledger accepted the settlement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementReceipt {
    pub message: Option<String>,
}
