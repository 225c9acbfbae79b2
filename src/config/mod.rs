//! Service settings.
//!
//! Everything comes from `ENTITLEMENTS__*` environment variables (a `.env`
//! file is read first when present). Nested keys are joined with `__`, so
//! `ENTITLEMENTS__PAYMENT__STRIPE__WEBHOOK_SECRET` fills
//! `payment.stripe.webhook_secret`.
//!
//! ```no_run
//! use entitlement_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("load settings");
//! config.validate().expect("valid settings");
//! ```

mod credentials;
mod database;
mod error;
mod payment;
mod server;

pub use credentials::CredentialsConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::{PaymentConfig, RazorpayConfig, StripeConfig};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub payment: PaymentConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl AppConfig {
    /// Fails when `database.url` is missing or a value does not parse.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ENTITLEMENTS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Cross-field checks the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.credentials.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
