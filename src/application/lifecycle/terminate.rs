//! terminate_purchase - cancellation and expiry.

use crate::domain::foundation::{
    EventId, PurchaseId, SerializableDomainEvent, StateMachine, Timestamp,
};
use crate::domain::purchase::{PlanCancelled, Purchase, PurchaseError, PurchaseStatus};

use super::LifecycleManager;

/// Command to end a record.
#[derive(Debug, Clone)]
pub struct TerminatePurchaseCommand {
    pub purchase_id: PurchaseId,
    /// `Cancelled` or `Expired`.
    pub status: PurchaseStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationResult {
    Terminated(Purchase),
    /// The record had already reached a terminal status.
    AlreadyTerminal(Purchase),
}

impl TerminationResult {
    pub fn purchase(&self) -> &Purchase {
        match self {
            TerminationResult::Terminated(p) | TerminationResult::AlreadyTerminal(p) => p,
        }
    }
}

impl LifecycleManager {
    /// Moves a pending or active record straight to cancelled/expired.
    ///
    /// The credential stays on the record; only a successor's activation
    /// takes it away.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `status` is not cancelled or expired
    /// - `NotFound` if the record doesn't exist
    pub async fn terminate_purchase(
        &self,
        cmd: TerminatePurchaseCommand,
    ) -> Result<TerminationResult, PurchaseError> {
        if !matches!(cmd.status, PurchaseStatus::Cancelled | PurchaseStatus::Expired) {
            return Err(PurchaseError::invalid_input(
                "status",
                format!("cannot terminate with status {}", cmd.status),
            ));
        }

        let mut record = self.load(&cmd.purchase_id).await?;
        if record.status.is_terminal() {
            return Ok(TerminationResult::AlreadyTerminal(record));
        }

        let now = Timestamp::now();
        record.terminate(cmd.status, now)?;
        if cmd.reason.is_some() {
            record.failure_reason = cmd.reason.clone();
        }
        self.purchases.update(&record).await?;

        tracing::info!(
            purchase_id = %record.id,
            user_id = %record.user_id,
            status = %record.status,
            "purchase terminated"
        );
        let event = PlanCancelled {
            event_id: EventId::new(),
            purchase_id: record.id,
            user_id: record.user_id.clone(),
            status: record.status,
            reason: cmd.reason,
            effective_at: now,
        };
        self.notify(event.to_envelope()).await;

        Ok(TerminationResult::Terminated(record))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{harness, user};
    use super::super::{ActivatePurchaseCommand, InitiatePurchaseCommand};
    use super::*;
    use crate::domain::foundation::{GatewayId, PlanId};

    async fn active(h: &super::super::test_support::Harness) -> Purchase {
        let id = h
            .manager
            .initiate_purchase(InitiatePurchaseCommand::new(
                user(),
                PlanId::new("basic").unwrap(),
                GatewayId::stripe(),
            ))
            .await
            .unwrap();
        h.manager
            .activate_purchase(ActivatePurchaseCommand::new(id))
            .await
            .unwrap()
            .purchase()
            .clone()
    }

    fn cancel(id: PurchaseId) -> TerminatePurchaseCommand {
        TerminatePurchaseCommand {
            purchase_id: id,
            status: PurchaseStatus::Cancelled,
            reason: Some("customer.subscription.deleted".to_string()),
        }
    }

    #[tokio::test]
    async fn cancels_active_record_and_stops_renewal() {
        let h = harness();
        let record = active(&h).await;

        let result = h.manager.terminate_purchase(cancel(record.id)).await.unwrap();

        let cancelled = result.purchase();
        assert!(matches!(result, TerminationResult::Terminated(_)));
        assert_eq!(cancelled.status, PurchaseStatus::Cancelled);
        assert!(!cancelled.auto_renew);
        assert!(cancelled.cancellation_effective_date.is_some());
        assert_eq!(cancelled.api_key, record.api_key);
        assert!(h
            .events
            .event_types()
            .contains(&"purchase.plan_cancelled.v1".to_string()));
    }

    #[tokio::test]
    async fn repeated_cancellation_is_a_no_op() {
        let h = harness();
        let record = active(&h).await;
        h.manager.terminate_purchase(cancel(record.id)).await.unwrap();

        let again = h.manager.terminate_purchase(cancel(record.id)).await.unwrap();

        assert!(matches!(again, TerminationResult::AlreadyTerminal(_)));
    }

    #[tokio::test]
    async fn rejects_non_terminal_target_status() {
        let h = harness();
        let record = active(&h).await;

        let err = h
            .manager
            .terminate_purchase(TerminatePurchaseCommand {
                purchase_id: record.id,
                status: PurchaseStatus::Switched,
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PurchaseError::InvalidInput { .. }));
    }
}
