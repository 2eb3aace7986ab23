// services/paystack.rs
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::config::PaystackConfig;
use crate::errors::{AppError, Result};

#[derive(Debug, Serialize)]
pub struct InitializeRequest {
    pub email: String,
    // minor units (kobo/pesewas)
    pub amount: i64,
    pub currency: String,
    pub reference: String,
    pub callback_url: String,
    pub metadata: Value,
}

/// Paystack wraps every payload in `{ status, message, data }`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

/// Fields of a successful initialize. Nothing here is trusted to be
/// present; the engine checks `authorization_url` before persisting.
#[derive(Debug, Default, Deserialize)]
pub struct InitializeData {
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub access_code: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct VerifyData {
    #[serde(default)]
    pub status: Option<String>,
    // minor units as reported by the gateway
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Seam between the reconciliation engine and the external processor.
/// `verify` returning `Ok(None)` means the gateway answered but sent no
/// transaction payload; transport and non-2xx failures are `Err` and
/// must be treated as retryable, never as a finalization.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: &InitializeRequest) -> Result<InitializeData>;
    async fn verify(&self, reference: &str) -> Result<Option<VerifyData>>;
}

#[derive(Debug, Clone)]
pub struct PaystackClient {
    config: PaystackConfig,
    client: Client,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        PaystackClient { config, client }
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(&self, request: &InitializeRequest) -> Result<InitializeData> {
        info!(
            "Paystack initialize: ref={} amount={} {}",
            request.reference, request.amount, request.currency
        );

        let url = format!("{}/transaction/initialize", self.config.base_url());
        let response = self
            .client
            .post(&url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.secret_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Paystack initialize failed: {} - {}", status, body);
            return Err(AppError::paystack(format!("initialize failed: {}", status)));
        }

        let envelope: ApiEnvelope<InitializeData> = response.json().await?;
        if !envelope.status {
            error!("Paystack initialize rejected: {}", envelope.message);
            return Err(AppError::paystack(envelope.message));
        }

        Ok(envelope.data.unwrap_or_default())
    }

    async fn verify(&self, reference: &str) -> Result<Option<VerifyData>> {
        info!("Paystack verify: ref={}", reference);

        let url = format!("{}/transaction/verify/{}", self.config.base_url(), reference);
        let response = self
            .client
            .get(&url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.secret_key),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Paystack verify failed: {} - {}", status, body);
            return Err(AppError::paystack(format!("verify failed: {}", status)));
        }

        let envelope: ApiEnvelope<VerifyData> = response.json().await?;
        Ok(envelope.data)
    }
}
