//! The back-office API: the only place balances come from, and where
//! settlements and price adjustments are sent.

pub mod http;
pub mod response;

use crate::adjustment::AdjustmentRequest;
use crate::input::BalanceRecord;
use crate::money::Amount;
use crate::settlement::{SettlementError, SettlementPayload, SettlementReceipt};

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;

/// Shown when balances can't be loaded and the API didn't tell us why.
pub const GENERIC_FETCH_FAILURE: &str = "the balances could not be loaded";

#[derive(Debug, Error, PartialEq)]
pub enum FetchError {
    /// Caught before calling the API.
    #[error("an agent id is required to load balances")]
    MissingOwner,

    #[error("could not reach the ledger: {0}")]
    Transport(String),

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response from the ledger: {0}")]
    InvalidBody(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A back-office route: the method, and the path segments relative to the
/// API base URL.
///
/// Ids are kept as separate segments so the client can escape them: an id
/// containing `/`, `?` or `#` must stay a single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub segments: Vec<String>,
}

impl Endpoint {
    pub fn new<S: Into<String>>(method: Method, segments: impl IntoIterator<Item = S>) -> Self {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Unescaped path, for logs.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

/// Everything the engine needs from the back-office.
///
/// Every call is a single request: nothing is retried, and nothing is sent
/// concurrently for the same user action.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All balances of an agent, unfiltered.
    async fn fetch_balances(&self, owner_id: &str) -> Result<Vec<BalanceRecord>, FetchError>;

    async fn submit_settlement(
        &self,
        payload: &SettlementPayload,
    ) -> Result<SettlementReceipt, SettlementError>;

    /// Refunds and credit charges caused by a reservation price change.
    async fn submit_adjustment(
        &self,
        request: &AdjustmentRequest,
    ) -> Result<SettlementReceipt, SettlementError>;

    async fn update_reservation_total(
        &self,
        reservation_id: &str,
        total: Amount,
    ) -> Result<SettlementReceipt, SettlementError>;
}
