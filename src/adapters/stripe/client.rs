//! Stripe API client for follow-up lookups.
//!
//! Only reads invoices: when a delivery references an invoice but carries
//! no purchase id itself, the invoice (or its subscription details) often
//! still has it in metadata.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{DomainError, ErrorCode, GatewayId};
use crate::domain::gateway::stripe::StripeObject;
use crate::ports::GatewayClient;

pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeClientConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    timeout: Duration,
}

impl StripeClientConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct StripeClient {
    config: StripeClientConfig,
    http_client: reqwest::Client,
}

impl StripeClient {
    /// # Errors
    ///
    /// `InternalError` if the HTTP client cannot be built.
    pub fn new(config: StripeClientConfig) -> Result<Self, DomainError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!("Failed to build Stripe HTTP client: {}", e),
                )
            })?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn invoice_url(&self, invoice_id: &str) -> String {
        format!("{}/v1/invoices/{}", self.config.api_base_url, invoice_id)
    }
}

#[async_trait]
impl GatewayClient for StripeClient {
    fn gateway(&self) -> GatewayId {
        GatewayId::stripe()
    }

    async fn related_purchase_ref(&self, object_id: &str) -> Result<Option<String>, DomainError> {
        let response = self
            .http_client
            .get(self.invoice_url(object_id))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::InternalError, format!("Stripe request failed: {}", e))
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Stripe API error ({}): {}", status, error_text),
            )
            .with_detail("invoice_id", object_id));
        }

        let invoice: StripeObject = response.json().await.map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to parse Stripe response: {}", e),
            )
        })?;

        Ok(invoice.purchase_ref())
    }
}
