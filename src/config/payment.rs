//! Payment gateway configuration
//!
//! Each provider section is optional; a provider without a section gets
//! no webhook endpoint. API credentials are only needed for the follow-up
//! lookups made when a delivery carries no purchase id.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Stripe settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeConfig {
    /// Secret API key (`sk_test_...` / `sk_live_...`)
    pub api_key: Option<String>,

    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: String,

    pub api_base_url: Option<String>,
}

impl StripeConfig {
    pub fn is_live_mode(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| key.starts_with("sk_live_"))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "payment.stripe.webhook_secret",
            ));
        }
        if !self.webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if let Some(key) = &self.api_key {
            if !key.starts_with("sk_") && !key.starts_with("rk_") {
                return Err(ValidationError::InvalidStripeKey);
            }
        }
        validate_base_url(self.api_base_url.as_deref())
    }
}

/// Razorpay settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: Option<String>,
    pub key_secret: Option<String>,

    /// Secret configured on the Razorpay webhook
    pub webhook_secret: String,

    pub api_base_url: Option<String>,
}

impl RazorpayConfig {
    /// Key id and secret, when both are set.
    pub fn api_credentials(&self) -> Option<(&str, &str)> {
        match (&self.key_id, &self.key_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "payment.razorpay.webhook_secret",
            ));
        }
        if self.key_id.is_some() != self.key_secret.is_some() {
            return Err(ValidationError::IncompleteRazorpayCredentials);
        }
        validate_base_url(self.api_base_url.as_deref())
    }
}

/// Payment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub stripe: Option<StripeConfig>,

    pub razorpay: Option<RazorpayConfig>,

    /// Timeout for follow-up calls to provider APIs
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl PaymentConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe.is_none() && self.razorpay.is_none() {
            return Err(ValidationError::NoGatewayConfigured);
        }
        if self.http_timeout_secs == 0 || self.http_timeout_secs > 120 {
            return Err(ValidationError::InvalidTimeout);
        }
        if let Some(stripe) = &self.stripe {
            stripe.validate()?;
        }
        if let Some(razorpay) = &self.razorpay {
            razorpay.validate()?;
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe: None,
            razorpay: None,
            http_timeout_secs: default_http_timeout(),
        }
    }
}

fn default_http_timeout() -> u64 {
    10
}

fn validate_base_url(url: Option<&str>) -> Result<(), ValidationError> {
    match url {
        Some(url) if !url.starts_with("https://") && !url.starts_with("http://") => {
            Err(ValidationError::InvalidApiBaseUrl(url.to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe() -> StripeConfig {
        StripeConfig {
            api_key: Some("sk_test_abc".to_string()),
            webhook_secret: "whsec_xyz".to_string(),
            api_base_url: None,
        }
    }

    #[test]
    fn at_least_one_gateway_is_required() {
        assert_eq!(
            PaymentConfig::default().validate(),
            Err(ValidationError::NoGatewayConfigured)
        );
    }

    #[test]
    fn stripe_secret_prefixes_are_checked() {
        let bad_secret = StripeConfig {
            webhook_secret: "secret".to_string(),
            ..stripe()
        };
        assert_eq!(
            bad_secret.validate(),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );

        let publishable = StripeConfig {
            api_key: Some("pk_test_abc".to_string()),
            ..stripe()
        };
        assert_eq!(publishable.validate(), Err(ValidationError::InvalidStripeKey));
    }

    #[test]
    fn stripe_without_api_key_is_webhook_only() {
        let config = StripeConfig {
            api_key: None,
            ..stripe()
        };
        assert!(config.validate().is_ok());
        assert!(!config.is_live_mode());
    }

    #[test]
    fn razorpay_credentials_come_in_pairs() {
        let half = RazorpayConfig {
            key_id: Some("rzp_test_1".to_string()),
            key_secret: None,
            webhook_secret: "s3cret".to_string(),
            api_base_url: None,
        };
        assert_eq!(
            half.validate(),
            Err(ValidationError::IncompleteRazorpayCredentials)
        );
        assert!(half.api_credentials().is_none());
    }

    #[test]
    fn base_url_needs_a_scheme() {
        let config = StripeConfig {
            api_base_url: Some("localhost:12111".to_string()),
            ..stripe()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidApiBaseUrl(_))
        ));
    }

    #[test]
    fn valid_config_passes() {
        let config = PaymentConfig {
            stripe: Some(stripe()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
    }
}
