//! Entitlement notifications.
//!
//! Emitted by the lifecycle manager after the corresponding write is
//! stored. Each carries the record id, the user id and a details payload.

use crate::domain::foundation::{
    domain_event, EventId, FeatureKey, GatewayId, PlanId, PurchaseId, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

use super::{Plan, Purchase, PurchaseStatus, TransactionType};

/// A new entitlement record was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInitiated {
    pub event_id: EventId,
    pub purchase_id: PurchaseId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub feature_key: FeatureKey,
    pub gateway_id: GatewayId,
    pub transaction_type: TransactionType,
    pub parent_purchase_id: Option<PurchaseId>,
    pub occurred_at: Timestamp,
}

domain_event!(
    PurchaseInitiated,
    event_type = "purchase.initiated.v1",
    aggregate_id = purchase_id,
    user = user_id,
    occurred_at = occurred_at,
    event_id = event_id
);

impl PurchaseInitiated {
    pub fn from_record(record: &Purchase) -> Self {
        Self {
            event_id: EventId::new(),
            purchase_id: record.id,
            user_id: record.user_id.clone(),
            plan_id: record.plan_id.clone(),
            feature_key: record.feature_key.clone(),
            gateway_id: record.gateway_id.clone(),
            transaction_type: record.transaction_type,
            parent_purchase_id: record.parent_purchase_id,
            occurred_at: record.purchase_date,
        }
    }
}

/// An entitlement became active.
///
/// Carries the plan terms merged with the record's own dates so consumers
/// (welcome mails, provisioning) need no follow-up read. The credential
/// itself is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseActivated {
    pub event_id: EventId,
    pub purchase_id: PurchaseId,
    pub user_id: UserId,
    pub plan: Plan,
    pub transaction_type: TransactionType,
    pub parent_purchase_id: Option<PurchaseId>,
    pub activation_date: Timestamp,
    pub expiry_date: Option<Timestamp>,
    pub auto_renew: bool,
    pub has_credential: bool,
    pub occurred_at: Timestamp,
}

domain_event!(
    PurchaseActivated,
    event_type = "purchase.activated.v1",
    aggregate_id = purchase_id,
    user = user_id,
    occurred_at = occurred_at,
    event_id = event_id
);

impl PurchaseActivated {
    pub fn from_record(record: &Purchase) -> Self {
        let activation_date = record.activation_date.unwrap_or(record.updated_at);
        Self {
            event_id: EventId::new(),
            purchase_id: record.id,
            user_id: record.user_id.clone(),
            plan: record.plan_snapshot.clone(),
            transaction_type: record.transaction_type,
            parent_purchase_id: record.parent_purchase_id,
            activation_date,
            expiry_date: record.expiry_date,
            auto_renew: record.auto_renew,
            has_credential: record.credential().is_some(),
            occurred_at: activation_date,
        }
    }
}

/// A payment failed and the record is now failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseFailed {
    pub event_id: EventId,
    pub purchase_id: PurchaseId,
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub reason: String,
    pub occurred_at: Timestamp,
}

domain_event!(
    PurchaseFailed,
    event_type = "purchase.failed.v1",
    aggregate_id = purchase_id,
    user = user_id,
    occurred_at = occurred_at,
    event_id = event_id
);

impl PurchaseFailed {
    pub fn from_record(record: &Purchase) -> Self {
        Self {
            event_id: EventId::new(),
            purchase_id: record.id,
            user_id: record.user_id.clone(),
            transaction_type: record.transaction_type,
            reason: record.failure_reason.clone().unwrap_or_default(),
            occurred_at: record.failure_timestamp.unwrap_or(record.updated_at),
        }
    }
}

/// An operator-approved plan switch completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSwitched {
    pub event_id: EventId,
    /// The new, active record.
    pub purchase_id: PurchaseId,
    pub user_id: UserId,
    pub original_purchase_id: PurchaseId,
    pub from_plan_id: PlanId,
    pub to_plan_id: PlanId,
    pub occurred_at: Timestamp,
}

domain_event!(
    PlanSwitched,
    event_type = "purchase.plan_switched.v1",
    aggregate_id = purchase_id,
    user = user_id,
    occurred_at = occurred_at,
    event_id = event_id
);

/// A record was cancelled or expired at the provider's request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCancelled {
    pub event_id: EventId,
    pub purchase_id: PurchaseId,
    pub user_id: UserId,
    pub status: PurchaseStatus,
    pub reason: Option<String>,
    pub effective_at: Timestamp,
}

domain_event!(
    PlanCancelled,
    event_type = "purchase.plan_cancelled.v1",
    aggregate_id = purchase_id,
    user = user_id,
    occurred_at = effective_at,
    event_id = event_id
);
