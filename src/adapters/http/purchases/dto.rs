//! HTTP DTOs for purchase and entitlement endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::purchase::{PaymentDetails, Purchase, PurchaseStatus, TransactionType};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Gateway references supplied by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub transaction_ref: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub gateway_subscription_id: Option<String>,
    #[serde(default)]
    pub gateway_customer_id: Option<String>,
    #[serde(default)]
    pub gateway_payment_method_id: Option<String>,
}

impl From<PaymentRequest> for PaymentDetails {
    fn from(req: PaymentRequest) -> Self {
        PaymentDetails {
            transaction_ref: req.transaction_ref,
            amount_cents: req.amount_cents,
            currency: req.currency,
            gateway_subscription_id: req.gateway_subscription_id,
            gateway_customer_id: req.gateway_customer_id,
            gateway_payment_method_id: req.gateway_payment_method_id,
        }
    }
}

/// Request to start a purchase.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePurchaseRequest {
    pub user_id: String,
    pub plan_id: String,
    pub gateway_id: String,
    /// Defaults to a first purchase.
    #[serde(default)]
    pub transaction_type: Option<TransactionType>,
    #[serde(default)]
    pub parent_purchase_id: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub payment: PaymentRequest,
}

/// Request to confirm a pending purchase.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivatePurchaseRequest {
    /// Restart the term of an already-active record.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub payment: PaymentRequest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordFailureRequest {
    pub reason: String,
    #[serde(default)]
    pub transaction_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerminatePurchaseRequest {
    /// `cancelled` or `expired`.
    pub status: PurchaseStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchRequest {
    pub target_plan_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialQuery {
    pub credential: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Entitlement record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub feature_key: String,
    pub status: PurchaseStatus,
    pub transaction_type: TransactionType,
    pub credential: Option<String>,
    pub gateway_id: String,
    pub transaction_id: Option<String>,
    pub gateway_subscription_id: Option<String>,
    pub parent_purchase_id: Option<String>,
    pub pending_switch_plan_id: Option<String>,
    pub requests_per_day: Option<i64>,
    pub requests_per_month: Option<i64>,
    pub auto_renew: bool,
    pub amount_paid: Option<i64>,
    pub currency: Option<String>,
    /// ISO 8601 timestamps.
    pub purchase_date: String,
    pub activation_date: Option<String>,
    pub expiry_date: Option<String>,
    pub failure_reason: Option<String>,
}

impl From<&Purchase> for PurchaseResponse {
    fn from(p: &Purchase) -> Self {
        Self {
            id: p.id.to_string(),
            user_id: p.user_id.to_string(),
            plan_id: p.plan_id.to_string(),
            plan_name: p.plan_snapshot.name.clone(),
            feature_key: p.feature_key.to_string(),
            status: p.status,
            transaction_type: p.transaction_type,
            credential: p.credential().map(str::to_string),
            gateway_id: p.gateway_id.to_string(),
            transaction_id: p.transaction_id.clone(),
            gateway_subscription_id: p.gateway_subscription_id.clone(),
            parent_purchase_id: p.parent_purchase_id.map(|id| id.to_string()),
            pending_switch_plan_id: p.pending_switch_plan_id.as_ref().map(|id| id.to_string()),
            requests_per_day: p.requests_per_day,
            requests_per_month: p.requests_per_month,
            auto_renew: p.auto_renew,
            amount_paid: p.amount_paid,
            currency: p.currency.clone(),
            purchase_date: p.purchase_date.to_string(),
            activation_date: p.activation_date.map(|t| t.to_string()),
            expiry_date: p.expiry_date.map(|t| t.to_string()),
            failure_reason: p.failure_reason.clone(),
        }
    }
}

/// Answer to "may this user use this feature?".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementResponse {
    pub entitled: bool,
    pub purchase: Option<PurchaseResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseHistoryResponse {
    pub purchases: Vec<PurchaseResponse>,
}

/// Result of an idempotent command: `changed` is false when the record
/// was already in the requested state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub changed: bool,
    pub purchase: PurchaseResponse,
}
