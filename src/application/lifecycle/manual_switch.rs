//! Operator-approved plan switches (e.g. paid by bank transfer).
//!
//! `request_manual_switch` marks the active record with the target plan;
//! `approve_manual_switch` completes it synchronously, the same way a
//! provider webhook would complete a paid switch.

use crate::domain::foundation::{
    EventId, GatewayId, PlanId, PurchaseId, SerializableDomainEvent, Timestamp,
};
use crate::domain::purchase::{
    PaymentDetails, PlanSwitched, Purchase, PurchaseError, PurchaseStatus, TransactionType,
};

use super::{InitiatePurchaseCommand, LifecycleManager};

impl LifecycleManager {
    /// Marks an active record as waiting for a switch to `target_plan_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record doesn't exist
    /// - `InvalidInput` if the record is not active
    /// - `InvalidPlan` if the target doesn't exist, is the current plan, or
    ///   belongs to another feature
    pub async fn request_manual_switch(
        &self,
        purchase_id: PurchaseId,
        target_plan_id: PlanId,
    ) -> Result<Purchase, PurchaseError> {
        let mut record = self.load(&purchase_id).await?;
        if record.status != PurchaseStatus::Active {
            return Err(PurchaseError::invalid_input(
                "purchase_id",
                format!("purchase {} is {}, not active", record.id, record.status),
            ));
        }

        let (target, _) = self.resolve_plan(&target_plan_id).await?;
        if target.feature_key != record.feature_key {
            return Err(PurchaseError::InvalidPlan(format!(
                "plan {} belongs to feature {}, not {}",
                target.id, target.feature_key, record.feature_key
            )));
        }
        if !target.active {
            return Err(PurchaseError::InvalidPlan(format!(
                "plan {} is no longer offered",
                target.id
            )));
        }
        if target.id == record.plan_id {
            return Err(PurchaseError::InvalidPlan(format!(
                "purchase is already on plan {}",
                target.id
            )));
        }

        record.request_switch(target.id, Timestamp::now())?;
        self.purchases.update(&record).await?;
        tracing::info!(
            purchase_id = %record.id,
            target_plan_id = %target_plan_id,
            "manual switch requested"
        );
        Ok(record)
    }

    /// Completes a requested switch and returns the new active record.
    ///
    /// The successor is created directly active; its activation retires the
    /// original as switched in the same storage transaction. If the
    /// successor does not reach active the original is left exactly as it
    /// was, marker included.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the original doesn't exist
    /// - `InvalidInput` if it is not active or has no switch awaiting approval
    /// - `SwitchNotCompleted` if the successor could not be activated
    pub async fn approve_manual_switch(
        &self,
        original_id: PurchaseId,
    ) -> Result<Purchase, PurchaseError> {
        let original = self.load(&original_id).await?;
        if original.status != PurchaseStatus::Active {
            return Err(PurchaseError::invalid_input(
                "purchase_id",
                format!("purchase {} is {}, not active", original.id, original.status),
            ));
        }
        let target = original.pending_switch_plan_id.clone().ok_or_else(|| {
            PurchaseError::invalid_input("purchase_id", "no plan switch is awaiting approval")
        })?;

        let not_completed = |reason: String| PurchaseError::SwitchNotCompleted {
            original: original_id.to_string(),
            reason,
        };

        let payment = PaymentDetails {
            gateway_customer_id: original.gateway_customer_id.clone(),
            ..PaymentDetails::default()
        };
        let cmd = InitiatePurchaseCommand::new(
            original.user_id.clone(),
            target.clone(),
            GatewayId::bank_transfer(),
        )
        .with_type(TransactionType::ManualAdminSwitch)
        .with_parent(original.id)
        .with_payment(payment);

        let successor_id = self
            .initiate_purchase(cmd)
            .await
            .map_err(|err| not_completed(err.to_string()))?;
        let successor = self.load(&successor_id).await?;

        if successor.status != PurchaseStatus::Active {
            let reason = successor
                .failure_reason
                .clone()
                .unwrap_or_else(|| format!("successor is {}", successor.status));
            tracing::warn!(
                purchase_id = %original_id,
                successor_id = %successor_id,
                reason = %reason,
                "manual switch did not complete"
            );
            return Err(not_completed(reason));
        }

        tracing::info!(
            purchase_id = %successor.id,
            original_purchase_id = %original_id,
            to_plan_id = %target,
            "manual switch approved"
        );
        let event = PlanSwitched {
            event_id: EventId::new(),
            purchase_id: successor.id,
            user_id: successor.user_id.clone(),
            original_purchase_id: original.id,
            from_plan_id: original.plan_id.clone(),
            to_plan_id: target,
            occurred_at: successor.activation_date.unwrap_or(successor.updated_at),
        };
        self.notify(event.to_envelope()).await;

        Ok(successor)
    }
}
