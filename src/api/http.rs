//! HTTP client for the back-office API.

use super::response::{balances_from_response, receipt_from_response};
use super::{Backend, Endpoint, FetchError};
use crate::adjustment::AdjustmentRequest;
use crate::config::{Config, ConfigError};
use crate::input::BalanceRecord;
use crate::money::{serde_money, Amount};
use crate::settlement::{SettlementError, SettlementPayload, SettlementReceipt};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use std::time::Duration;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let invalid_url = || ConfigError::Invalid {
            name: "BACKOFFICE_API_URL",
            value: config.base_url.clone(),
        };
        let base_url = Url::parse(config.base_url.trim()).map_err(|_| invalid_url())?;
        if base_url.cannot_be_a_base() {
            return Err(invalid_url());
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut api_key =
            HeaderValue::from_str(&config.api_key).map_err(|_| ConfigError::Invalid {
                name: "BACKOFFICE_API_KEY",
                value: "<redacted>".to_string(),
            })?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, base_url })
    }

    // Every segment is percent-encoded, so ids can't change the route.
    fn url(&self, endpoint: &Endpoint) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected the URLs that can't take path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(&endpoint.segments);
        }
        url
    }

    // Status and body, whatever the status is: deciding what is a failure is
    // left to the `response` module.
    async fn send<B: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        body: Option<&B>,
    ) -> Result<(u16, String), reqwest::Error> {
        let url = self.url(&endpoint);
        let method = endpoint.method;
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        tracing::debug!(%method, %url, status, "back-office call");
        Ok((status, text))
    }
}

#[derive(Serialize)]
struct ReservationTotal {
    #[serde(serialize_with = "serde_money::serialize")]
    total: Amount,
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_balances(&self, owner_id: &str) -> Result<Vec<BalanceRecord>, FetchError> {
        let endpoint = Endpoint::new(Method::GET, ["saldos", "agente", owner_id]);
        let (status, body) = self.send::<()>(endpoint, None).await?;
        balances_from_response(status, &body)
    }

    async fn submit_settlement(
        &self,
        payload: &SettlementPayload,
    ) -> Result<SettlementReceipt, SettlementError> {
        let (status, body) = self.send(payload.target.endpoint(), Some(payload)).await?;
        receipt_from_response(status, &body)
    }

    async fn submit_adjustment(
        &self,
        request: &AdjustmentRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let (status, body) = self.send(request.endpoint(), Some(request)).await?;
        receipt_from_response(status, &body)
    }

    async fn update_reservation_total(
        &self,
        reservation_id: &str,
        total: Amount,
    ) -> Result<SettlementReceipt, SettlementError> {
        let endpoint = Endpoint::new(Method::PATCH, ["reservas", reservation_id]);
        let body = ReservationTotal { total };
        let (status, body) = self.send(endpoint, Some(&body)).await?;
        receipt_from_response(status, &body)
    }
}
