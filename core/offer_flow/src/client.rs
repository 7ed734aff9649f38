//! Creation endpoint client.
//!
//! The wizard talks to the endpoint through [`ExchangeTransport`];
//! [`HttpTransport`] is the `reqwest` implementation. A request is sent once:
//! failures are reported, never retried, so the user decides whether to
//! submit again.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::SubmitError;
use crate::payload::SubmissionPayload;

const DEFAULT_ENDPOINT: &str =
    "http://localhost:3001/api/student/exchanges/productforproductexchange";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full URL of the creation endpoint
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, SubmitError> {
        Ok(ClientConfig {
            endpoint: std::env::var("EXCHANGE_API_URL")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            timeout_secs: std::env::var("EXCHANGE_API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| SubmitError::Config("Invalid EXCHANGE_API_TIMEOUT_SECS".to_string()))?,
        })
    }
}

/// Performs the creation request for an assembled payload.
pub trait ExchangeTransport {
    /// Send `payload`; `Ok` carries the endpoint's JSON answer.
    fn create(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<Value, SubmitError>> + Send;
}

pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, SubmitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.endpoint))
    }

    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ExchangeTransport for HttpTransport {
    async fn create(&self, payload: &SubmissionPayload) -> Result<Value, SubmitError> {
        let form = payload.to_multipart()?;
        debug!(parts = payload.len(), endpoint = %self.endpoint, "posting exchange payload");

        let resp = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Creation endpoint rejected the exchange ({status})");
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json::<Value>().await?)
    }
}
