use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read settings: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// A setting that parsed but makes no sense.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid socket address: {0}")]
    InvalidAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("No payment gateway configured")]
    NoGatewayConfigured,

    #[error("Invalid Stripe API key format")]
    InvalidStripeKey,

    #[error("Invalid Stripe webhook secret format")]
    InvalidStripeWebhookSecret,

    #[error("Razorpay key_id and key_secret must be set together")]
    IncompleteRazorpayCredentials,

    #[error("Invalid gateway API base URL: {0}")]
    InvalidApiBaseUrl(String),

    #[error("Credential attempts must be between 1 and 100")]
    InvalidCredentialAttempts,
}
