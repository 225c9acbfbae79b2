//! Lifecycle error taxonomy.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | InvalidInput | 400 |
//! | InvalidPlan | 422 |
//! | AlreadyEntitled | 409 |
//! | NotFound | 404 |
//! | NotPendingPayment | 409 |
//! | SwitchNotCompleted | 409 |
//! | DuplicateTransaction | 409 |
//! | CredentialGenerationExhausted | 500 |
//! | Storage | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors returned by lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurchaseError {
    #[error("Invalid input for '{field}': {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("User {user_id} already has an active entitlement for {feature_key}")]
    AlreadyEntitled {
        user_id: String,
        feature_key: String,
    },

    #[error("Purchase not found: {0}")]
    NotFound(String),

    #[error("Purchase {purchase_id} is {status}, not pending payment")]
    NotPendingPayment { purchase_id: String, status: String },

    #[error("Could not generate a unique credential after {attempts} attempts")]
    CredentialGenerationExhausted { attempts: u32 },

    #[error("Switch of {original} did not complete: {reason}")]
    SwitchNotCompleted { original: String, reason: String },

    #[error("Transaction {0} was already recorded")]
    DuplicateTransaction(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PurchaseError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        PurchaseError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_pending(purchase_id: impl ToString, status: impl ToString) -> Self {
        PurchaseError::NotPendingPayment {
            purchase_id: purchase_id.to_string(),
            status: status.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PurchaseError::InvalidInput { .. } => "INVALID_INPUT",
            PurchaseError::InvalidPlan(_) => "INVALID_PLAN",
            PurchaseError::AlreadyEntitled { .. } => "ALREADY_ENTITLED",
            PurchaseError::NotFound(_) => "NOT_FOUND",
            PurchaseError::NotPendingPayment { .. } => "NOT_PENDING_PAYMENT",
            PurchaseError::CredentialGenerationExhausted { .. } => {
                "CREDENTIAL_GENERATION_EXHAUSTED"
            }
            PurchaseError::SwitchNotCompleted { .. } => "SWITCH_NOT_COMPLETED",
            PurchaseError::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            PurchaseError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns true if the caller did something wrong, as opposed to the
    /// engine or its storage failing.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PurchaseError::CredentialGenerationExhausted { .. } | PurchaseError::Storage(_)
        )
    }
}

impl From<ValidationError> for PurchaseError {
    fn from(err: ValidationError) -> Self {
        PurchaseError::InvalidInput {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for PurchaseError {
    fn from(err: DomainError) -> Self {
        let detail = |key: &str| err.details.get(key).cloned().unwrap_or_default();
        match err.code {
            ErrorCode::ValidationFailed => PurchaseError::InvalidInput {
                field: detail("field"),
                message: err.message.clone(),
            },
            ErrorCode::PlanNotFound => PurchaseError::InvalidPlan(err.message.clone()),
            ErrorCode::PurchaseNotFound => PurchaseError::NotFound(detail("purchase_id")),
            ErrorCode::ActiveEntitlementExists => PurchaseError::AlreadyEntitled {
                user_id: detail("user_id"),
                feature_key: detail("feature_key"),
            },
            ErrorCode::InvalidStateTransition => PurchaseError::NotPendingPayment {
                purchase_id: detail("purchase_id"),
                status: detail("status"),
            },
            ErrorCode::DuplicateTransaction => {
                PurchaseError::DuplicateTransaction(detail("transaction_id"))
            }
            ErrorCode::CredentialConflict
            | ErrorCode::DatabaseError
            | ErrorCode::InternalError => PurchaseError::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transition_error_maps_to_not_pending() {
        let err = DomainError::new(ErrorCode::InvalidStateTransition, "nope")
            .with_detail("purchase_id", "p-1")
            .with_detail("status", "failed");

        assert_eq!(
            PurchaseError::from(err),
            PurchaseError::not_pending("p-1", "failed")
        );
    }

    #[test]
    fn active_conflict_maps_to_already_entitled() {
        let err = DomainError::new(ErrorCode::ActiveEntitlementExists, "conflict")
            .with_detail("user_id", "u-1")
            .with_detail("feature_key", "geo-api");

        let mapped = PurchaseError::from(err);
        assert_eq!(mapped.code(), "ALREADY_ENTITLED");
        assert!(mapped.is_client_error());
    }

    #[test]
    fn database_error_maps_to_storage() {
        let err = DomainError::database("insert purchase", "connection reset");
        let mapped = PurchaseError::from(err);

        assert!(matches!(mapped, PurchaseError::Storage(_)));
        assert!(!mapped.is_client_error());
    }

    #[test]
    fn exhausted_message_names_attempts() {
        let err = PurchaseError::CredentialGenerationExhausted { attempts: 10 };
        assert_eq!(
            err.to_string(),
            "Could not generate a unique credential after 10 attempts"
        );
    }
}
