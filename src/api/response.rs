//! Reading API responses.
//!
//! Kept apart from the HTTP client so the rules can be tested without a
//! server: a response is only a status code and a body.

use super::{FetchError, GENERIC_FETCH_FAILURE};
use crate::input::BalanceRecord;
use crate::settlement::{SettlementError, SettlementReceipt, GENERIC_SETTLEMENT_FAILURE};

use serde::Deserialize;

/// Envelope used by every endpoint. All fields are optional: some endpoints
/// only send a message, some only data.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub data: Option<T>,
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

// The server message if there's a usable one, our own otherwise.
fn message_or(message: Option<String>, fallback: &str) -> String {
    message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn envelope_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|r| r.message)
}

pub fn balances_from_response(status: u16, body: &str) -> Result<Vec<BalanceRecord>, FetchError> {
    if !is_success(status) {
        return Err(FetchError::Rejected {
            status,
            message: message_or(envelope_message(body), GENERIC_FETCH_FAILURE),
        });
    }

    let response: ApiResponse<Vec<BalanceRecord>> =
        serde_json::from_str(body).map_err(|err| FetchError::InvalidBody(err.to_string()))?;

    if response.success == Some(false) {
        return Err(FetchError::Rejected {
            status,
            message: message_or(response.message, GENERIC_FETCH_FAILURE),
        });
    }

    response
        .data
        .ok_or_else(|| FetchError::InvalidBody("missing balance list".to_string()))
}

pub fn receipt_from_response(status: u16, body: &str) -> Result<SettlementReceipt, SettlementError> {
    let response = serde_json::from_str::<ApiResponse<serde_json::Value>>(body).ok();
    let (success, message) = match response {
        Some(r) => (r.success, r.message),
        None => (None, None),
    };

    if !is_success(status) || success == Some(false) {
        return Err(SettlementError::Rejected {
            status,
            message: message_or(message, GENERIC_SETTLEMENT_FAILURE),
        });
    }

    Ok(SettlementReceipt { message })
}
