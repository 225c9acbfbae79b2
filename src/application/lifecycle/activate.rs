//! activate_purchase - idempotent payment confirmation.

use crate::domain::foundation::{PurchaseId, SerializableDomainEvent, Timestamp};
use crate::domain::purchase::{
    PaymentDetails, Purchase, PurchaseActivated, PurchaseError, PurchaseStatus,
};

use super::{LifecycleManager, RecordFailureCommand};

/// Command to confirm payment for a record.
#[derive(Debug, Clone)]
pub struct ActivatePurchaseCommand {
    pub purchase_id: PurchaseId,
    pub payment: PaymentDetails,
    /// Re-run activation on a record that is already active.
    pub force: bool,
}

impl ActivatePurchaseCommand {
    pub fn new(purchase_id: PurchaseId) -> Self {
        Self {
            purchase_id,
            payment: PaymentDetails::default(),
            force: false,
        }
    }

    pub fn with_payment(mut self, payment: PaymentDetails) -> Self {
        self.payment = payment;
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Result of an activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationResult {
    /// The record became (or, when forced, was re-made) active.
    Activated(Purchase),
    /// The record was already active; only missing references were filled.
    AlreadyActive(Purchase),
}

impl ActivationResult {
    pub fn purchase(&self) -> &Purchase {
        match self {
            ActivationResult::Activated(p) | ActivationResult::AlreadyActive(p) => p,
        }
    }
}

impl LifecycleManager {
    /// Confirms payment for a record.
    ///
    /// Safe to call repeatedly for the same payment: an active record is
    /// left as is apart from gateway references it was still missing.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record doesn't exist
    /// - `NotPendingPayment` if the record is terminal
    /// - any error from the activation itself, after the record has been
    ///   marked failed with that reason
    pub async fn activate_purchase(
        &self,
        cmd: ActivatePurchaseCommand,
    ) -> Result<ActivationResult, PurchaseError> {
        let mut record = self.load(&cmd.purchase_id).await?;

        match record.status {
            PurchaseStatus::Active if cmd.force => {
                record.refresh_activation(Timestamp::now(), &cmd.payment)?;
                self.purchases.update(&record).await?;
                tracing::info!(purchase_id = %record.id, "activation refreshed");
                self.notify(PurchaseActivated::from_record(&record).to_envelope())
                    .await;
                Ok(ActivationResult::Activated(record))
            }
            PurchaseStatus::Active => {
                if record.backfill(&cmd.payment) {
                    record.updated_at = Timestamp::now();
                    self.purchases.update(&record).await?;
                    tracing::debug!(purchase_id = %record.id, "back-filled gateway references");
                }
                Ok(ActivationResult::AlreadyActive(record))
            }
            PurchaseStatus::PendingPayment => self
                .complete_activation(record, &cmd.payment)
                .await
                .map(ActivationResult::Activated),
            status => Err(PurchaseError::not_pending(record.id, status)),
        }
    }

    /// Runs the pending → active transition and records a failure if any
    /// step of it goes wrong.
    pub(super) async fn complete_activation(
        &self,
        record: Purchase,
        payment: &PaymentDetails,
    ) -> Result<Purchase, PurchaseError> {
        let id = record.id;
        match self.run_activation(record, payment).await {
            Ok(record) => {
                tracing::info!(
                    purchase_id = %record.id,
                    user_id = %record.user_id,
                    transaction_type = %record.transaction_type,
                    expiry_date = ?record.expiry_date.map(|e| e.to_string()),
                    "purchase activated"
                );
                self.notify(PurchaseActivated::from_record(&record).to_envelope())
                    .await;
                Ok(record)
            }
            Err(err) => {
                tracing::warn!(purchase_id = %id, error = %err, "activation failed");
                let failure = RecordFailureCommand {
                    purchase_id: id,
                    reason: format!("activation failed: {}", err),
                    transaction_ref: payment.transaction_ref.clone(),
                };
                if let Err(record_err) = self.record_purchase_failure(failure).await {
                    tracing::error!(
                        purchase_id = %id,
                        error = %record_err,
                        "could not record activation failure"
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_activation(
        &self,
        mut record: Purchase,
        payment: &PaymentDetails,
    ) -> Result<Purchase, PurchaseError> {
        let kind = self
            .resolve_feature(&record.feature_key)
            .await?
            .credential_kind;
        let parent = match &record.parent_purchase_id {
            Some(parent_id) => self.purchases.find_by_id(parent_id).await?,
            None => None,
        };

        let now = Timestamp::now();
        record.activate(now, payment)?;

        match parent {
            Some(mut parent) => {
                // Release on the parent first; both rows are written in one
                // transaction, parent before child.
                let inherited = if parent.status == PurchaseStatus::Active {
                    parent.supersede(record.transaction_type.superseded_parent_status(), now)?
                } else {
                    parent.release_credential(now)
                };
                if kind.requires_credential() {
                    let value = match inherited.filter(|value| !value.is_empty()) {
                        Some(value) => value,
                        None => {
                            self.credentials
                                .generate_unique_key(kind, Some(&record.id))
                                .await?
                        }
                    };
                    record.assign_credential(kind, value);
                }
                self.purchases.supersede(&parent, &record).await?;
                tracing::debug!(
                    purchase_id = %record.id,
                    parent_id = %parent.id,
                    parent_status = %parent.status,
                    "parent superseded"
                );
            }
            None => {
                if kind.requires_credential() && record.credential().is_none() {
                    let value = self
                        .credentials
                        .generate_unique_key(kind, Some(&record.id))
                        .await?;
                    record.assign_credential(kind, value);
                }
                self.purchases.update(&record).await?;
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{harness, user};
    use super::super::InitiatePurchaseCommand;
    use super::*;
    use crate::domain::foundation::{GatewayId, PlanId};
    use crate::domain::purchase::TransactionType;
    use crate::ports::PurchaseRepository;

    async fn pending(h: &super::super::test_support::Harness, plan: &str) -> PurchaseId {
        h.manager
            .initiate_purchase(InitiatePurchaseCommand::new(
                user(),
                PlanId::new(plan).unwrap(),
                GatewayId::stripe(),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn activation_sets_expiry_and_keeps_inline_key() {
        let h = harness();
        let id = pending(&h, "basic").await;
        let key = h.purchases.find_by_id(&id).await.unwrap().unwrap().api_key;

        let result = h
            .manager
            .activate_purchase(
                ActivatePurchaseCommand::new(id)
                    .with_payment(PaymentDetails::default().with_transaction_ref("pi_1")),
            )
            .await
            .unwrap();

        let record = result.purchase();
        assert!(matches!(result, ActivationResult::Activated(_)));
        assert_eq!(record.status, PurchaseStatus::Active);
        assert_eq!(
            record.expiry_date,
            Some(record.activation_date.unwrap().add_days(30))
        );
        assert!(record.auto_renew);
        assert_eq!(record.api_key, key);
        assert_eq!(record.transaction_id.as_deref(), Some("pi_1"));
    }

    #[tokio::test]
    async fn duplicate_confirmation_only_backfills() {
        let h = harness();
        let id = pending(&h, "basic").await;
        let first = h
            .manager
            .activate_purchase(ActivatePurchaseCommand::new(id))
            .await
            .unwrap();

        let second = h
            .manager
            .activate_purchase(
                ActivatePurchaseCommand::new(id)
                    .with_payment(PaymentDetails::default().with_customer("cus_1")),
            )
            .await
            .unwrap();

        assert!(matches!(second, ActivationResult::AlreadyActive(_)));
        assert_eq!(second.purchase().expiry_date, first.purchase().expiry_date);
        assert_eq!(second.purchase().api_key, first.purchase().api_key);
        assert_eq!(second.purchase().gateway_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(h.purchases.list_by_user(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_time_plan_never_expires_and_needs_no_key() {
        let h = harness();
        let id = pending(&h, "reports-lifetime").await;

        let result = h
            .manager
            .activate_purchase(ActivatePurchaseCommand::new(id))
            .await
            .unwrap();

        assert!(result.purchase().expiry_date.is_none());
        assert!(!result.purchase().auto_renew);
        assert!(result.purchase().credential().is_none());
    }

    #[tokio::test]
    async fn terminal_records_never_reactivate() {
        let h = harness();
        let id = pending(&h, "basic").await;
        h.manager
            .record_purchase_failure(RecordFailureCommand {
                purchase_id: id,
                reason: "declined".to_string(),
                transaction_ref: None,
            })
            .await
            .unwrap();

        let err = h
            .manager
            .activate_purchase(ActivatePurchaseCommand::new(id))
            .await
            .unwrap_err();
        assert_eq!(err, PurchaseError::not_pending(id, "failed"));
    }

    #[tokio::test]
    async fn renewal_inherits_the_parent_key() {
        let h = harness();
        let original = pending(&h, "basic").await;
        h.manager
            .activate_purchase(ActivatePurchaseCommand::new(original))
            .await
            .unwrap();
        let key = h.purchases.find_by_id(&original).await.unwrap().unwrap().api_key;

        let renewal = h
            .manager
            .initiate_purchase(
                InitiatePurchaseCommand::new(user(), PlanId::new("basic").unwrap(), GatewayId::stripe())
                    .with_type(TransactionType::RenewalSuccess)
                    .with_parent(original),
            )
            .await
            .unwrap();

        let parent = h.purchases.find_by_id(&original).await.unwrap().unwrap();
        let child = h.purchases.find_by_id(&renewal).await.unwrap().unwrap();
        assert_eq!(parent.status, PurchaseStatus::Expired);
        assert!(parent.api_key.is_none());
        assert_eq!(child.status, PurchaseStatus::Active);
        assert_eq!(child.api_key, key);
    }

    #[tokio::test]
    async fn forced_activation_restarts_the_term() {
        let h = harness();
        let id = pending(&h, "basic").await;
        let first = h
            .manager
            .activate_purchase(ActivatePurchaseCommand::new(id))
            .await
            .unwrap();

        let forced = h
            .manager
            .activate_purchase(ActivatePurchaseCommand::new(id).forced())
            .await
            .unwrap();

        assert!(matches!(forced, ActivationResult::Activated(_)));
        assert!(forced.purchase().expiry_date >= first.purchase().expiry_date);
        assert_eq!(forced.purchase().api_key, first.purchase().api_key);
    }
}
