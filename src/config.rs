//! Configuration, read from the environment.

use crate::money::{parse_money, Amount};

use rust_decimal::Decimal;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("could not build the HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Back-office API base URL (env: BACKOFFICE_API_URL)
    pub base_url: String,
    /// Sent with every request (env: BACKOFFICE_API_KEY)
    pub api_key: String,
    /// Request timeout in seconds (env: BACKOFFICE_TIMEOUT_SECS)
    pub timeout_secs: u64,
    /// Lowest nightly price that can be charged on credit
    /// (env: BACKOFFICE_MIN_NIGHTLY_PRICE). Zero disables the check.
    pub minimum_nightly_price: Amount,
}

impl Config {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            minimum_nightly_price: Decimal::ZERO,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_minimum_nightly_price(mut self, price: Amount) -> Self {
        self.minimum_nightly_price = price;
        self
    }

    /// Load configuration from environment variables. The binary loads `.env`
    /// into the environment before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        let base_url = var("BACKOFFICE_API_URL").ok_or(ConfigError::Missing("BACKOFFICE_API_URL"))?;
        let api_key = var("BACKOFFICE_API_KEY").ok_or(ConfigError::Missing("BACKOFFICE_API_KEY"))?;
        let mut config = Self::new(base_url, api_key);

        if let Some(raw) = var("BACKOFFICE_TIMEOUT_SECS") {
            config.timeout_secs = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "BACKOFFICE_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
        }

        if let Some(raw) = var("BACKOFFICE_MIN_NIGHTLY_PRICE") {
            let price = parse_money(&raw);
            if price < Decimal::ZERO {
                return Err(ConfigError::Invalid {
                    name: "BACKOFFICE_MIN_NIGHTLY_PRICE",
                    value: raw,
                });
            }
            config.minimum_nightly_price = price;
        }

        Ok(config)
    }
}
