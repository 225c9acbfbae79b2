//! Webhook error types.
//!
//! Only failures to authenticate or read a delivery are errors. Anything
//! that goes wrong after a payload is verified is reported as a
//! reconciliation outcome and acknowledged, so provider retries are not
//! amplified.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that reject a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No reconciler is registered for the requested gateway.
    #[error("Unknown gateway: {0}")]
    UnknownGateway(String),

    /// The signature header is absent.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is older than the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl WebhookError {
    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::UnknownGateway(_) => StatusCode::NOT_FOUND,
            WebhookError::MissingHeader(_)
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Error Display Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_error_displays_message() {
        let err = WebhookError::ParseError("invalid JSON".to_string());
        assert_eq!(format!("{}", err), "Parse error: invalid JSON");
    }

    #[test]
    fn missing_header_displays_name() {
        let err = WebhookError::MissingHeader("Stripe-Signature");
        assert_eq!(format!("{}", err), "Missing header: Stripe-Signature");
    }

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn verification_failures_are_bad_requests() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::TimestampOutOfRange.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::ParseError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unknown_gateway_is_not_found() {
        assert_eq!(
            WebhookError::UnknownGateway("paypal".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
