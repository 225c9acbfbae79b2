//! Razorpay API client for follow-up lookups.
//!
//! Reads orders: a captured payment carries its `order_id`, and the order
//! holds the notes set when checkout created it.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{DomainError, ErrorCode, GatewayId};
use crate::domain::gateway::razorpay::{purchase_ref_from_notes, RazorpayOrder};
use crate::ports::GatewayClient;

pub const DEFAULT_API_BASE_URL: &str = "https://api.razorpay.com";

#[derive(Clone)]
pub struct RazorpayClientConfig {
    key_id: String,
    key_secret: SecretString,
    api_base_url: String,
    timeout: Duration,
}

impl RazorpayClientConfig {
    pub fn new(key_id: impl Into<String>, key_secret: SecretString) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct RazorpayClient {
    config: RazorpayClientConfig,
    http_client: reqwest::Client,
}

impl RazorpayClient {
    /// # Errors
    ///
    /// `InternalError` if the HTTP client cannot be built.
    pub fn new(config: RazorpayClientConfig) -> Result<Self, DomainError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!("Failed to build Razorpay HTTP client: {}", e),
                )
            })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn order_url(&self, order_id: &str) -> String {
        format!("{}/v1/orders/{}", self.config.api_base_url, order_id)
    }
}

#[async_trait]
impl GatewayClient for RazorpayClient {
    fn gateway(&self) -> GatewayId {
        GatewayId::razorpay()
    }

    async fn related_purchase_ref(&self, object_id: &str) -> Result<Option<String>, DomainError> {
        let response = self
            .http_client
            .get(self.order_url(object_id))
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.expose_secret()))
            .send()
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!("Razorpay request failed: {}", e),
                )
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Razorpay API error ({}): {}", status, error_text),
            )
            .with_detail("order_id", object_id));
        }

        let order: RazorpayOrder = response.json().await.map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to parse Razorpay response: {}", e),
            )
        })?;

        Ok(purchase_ref_from_notes(&order.notes))
    }
}
