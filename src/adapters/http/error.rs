//! Error responses shared by every route.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::gateway::WebhookError;
use crate::domain::purchase::PurchaseError;

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

/// API error type that converts lifecycle errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub PurchaseError);

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PurchaseError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            PurchaseError::InvalidPlan(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PurchaseError::NotFound(_) => StatusCode::NOT_FOUND,
            PurchaseError::AlreadyEntitled { .. }
            | PurchaseError::NotPendingPayment { .. }
            | PurchaseError::SwitchNotCompleted { .. }
            | PurchaseError::DuplicateTransaction(_) => StatusCode::CONFLICT,
            PurchaseError::CredentialGenerationExhausted { .. } | PurchaseError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        // Storage details stay in the logs.
        let message = match &self.0 {
            PurchaseError::Storage(_) => "Internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorResponse::new(self.0.code(), message))).into_response()
    }
}

/// Rejection of a webhook delivery.
pub struct WebhookRejection(pub WebhookError);

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            WebhookError::UnknownGateway(_) => "UNKNOWN_GATEWAY",
            WebhookError::MissingHeader(_) => "MISSING_HEADER",
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::TimestampOutOfRange | WebhookError::InvalidTimestamp => {
                "INVALID_TIMESTAMP"
            }
            WebhookError::ParseError(_) => "INVALID_PAYLOAD",
        };
        (
            self.0.status_code(),
            Json(ErrorResponse::new(code, self.0.to_string())),
        )
            .into_response()
    }
}
