//! WebhookEventRepository port - delivery ledger for gateway webhooks.
//!
//! Providers deliver at least once, in any order. The ledger remembers
//! every delivery and what reconciling it produced, so redeliveries of
//! settled events are acknowledged without touching entitlements, while
//! deliveries that could not be linked or failed can be retried.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, GatewayId, PurchaseId, Timestamp};

/// Outcomes after which a redelivery is processed again.
pub const RETRYABLE_OUTCOMES: [&str; 2] = ["unresolved", "failed"];

/// Record of one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEventRecord {
    pub gateway_id: GatewayId,

    /// Provider event id.
    pub event_id: String,

    /// Provider event name (e.g. "invoice.paid").
    pub event_type: String,

    /// Reconciliation outcome label (e.g. "activated", "unresolved").
    pub outcome: String,

    /// Human-readable context for operators.
    pub detail: Option<String>,

    /// Record the delivery was linked to, if any.
    pub purchase_id: Option<PurchaseId>,

    pub received_at: Timestamp,
}

impl WebhookEventRecord {
    /// Returns true if redeliveries of this event should be skipped.
    pub fn is_final(&self) -> bool {
        !RETRYABLE_OUTCOMES.contains(&self.outcome.as_str())
    }
}

/// Result of attempting to save a delivery record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was written (first delivery, or replacing a retryable outcome).
    Recorded,
    /// A final outcome was already stored by a concurrent delivery.
    AlreadyFinal,
}

/// Port for the webhook delivery ledger.
///
/// Implementations should key on (gateway_id, event_id) and only replace
/// rows whose stored outcome is retryable.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find(
        &self,
        gateway_id: &GatewayId,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: &str) -> WebhookEventRecord {
        WebhookEventRecord {
            gateway_id: GatewayId::stripe(),
            event_id: "evt_1".to_string(),
            event_type: "invoice.paid".to_string(),
            outcome: outcome.to_string(),
            detail: None,
            purchase_id: None,
            received_at: Timestamp::now(),
        }
    }

    #[test]
    fn settled_outcomes_are_final() {
        assert!(record("activated").is_final());
        assert!(record("duplicate_renewal").is_final());
        assert!(record("ignored").is_final());
    }

    #[test]
    fn unresolved_and_failed_can_be_retried() {
        assert!(!record("unresolved").is_final());
        assert!(!record("failed").is_final());
    }
}
