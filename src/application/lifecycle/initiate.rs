//! initiate_purchase - creates a new entitlement record.

use crate::domain::foundation::{
    GatewayId, PlanId, PurchaseId, SerializableDomainEvent, Timestamp, UserId,
};
use crate::domain::purchase::{
    PaymentDetails, Purchase, PurchaseError, PurchaseFailed, PurchaseInitiated, PurchaseStatus,
    TransactionType,
};

use super::LifecycleManager;

/// Command to create an entitlement record.
#[derive(Debug, Clone)]
pub struct InitiatePurchaseCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub gateway_id: GatewayId,
    pub transaction_type: TransactionType,
    pub parent_purchase_id: Option<PurchaseId>,
    /// Address of the client starting checkout, if known.
    pub client_ip: Option<String>,
    /// Gateway references already known at creation time.
    pub payment: PaymentDetails,
    /// Reason stored on records created directly as failed.
    pub failure_reason: Option<String>,
}

impl InitiatePurchaseCommand {
    /// A fresh first purchase.
    pub fn new(user_id: UserId, plan_id: PlanId, gateway_id: GatewayId) -> Self {
        Self {
            user_id,
            plan_id,
            gateway_id,
            transaction_type: TransactionType::Purchase,
            parent_purchase_id: None,
            client_ip: None,
            payment: PaymentDetails::default(),
            failure_reason: None,
        }
    }

    pub fn with_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    pub fn with_parent(mut self, parent: PurchaseId) -> Self {
        self.parent_purchase_id = Some(parent);
        self
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    pub fn with_payment(mut self, payment: PaymentDetails) -> Self {
        self.payment = payment;
        self
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

impl LifecycleManager {
    /// Creates a new record and returns its id.
    ///
    /// Fresh purchases and attempts start pending. System-computed outcomes
    /// start where they belong: `renewal_success`, `switch_success` and
    /// `manual_admin_switch` run the activation path straight away, while
    /// `renewal_failure` and `switch_failure` are stored failed.
    ///
    /// A direct activation that fails leaves the new record stored as failed
    /// with the reason, and the activation error is returned.
    ///
    /// # Errors
    ///
    /// - `InvalidPlan` if the plan or its feature does not exist
    /// - `AlreadyEntitled` for a purchase while an active record exists
    /// - `InvalidInput` if the parent is missing or belongs elsewhere
    /// - `DuplicateTransaction` if a renewal reference is already recorded
    /// - whatever stopped a direct activation (`Storage`, `NotPendingPayment`, ...)
    pub async fn initiate_purchase(
        &self,
        cmd: InitiatePurchaseCommand,
    ) -> Result<PurchaseId, PurchaseError> {
        let (plan, feature) = self.resolve_plan(&cmd.plan_id).await?;

        if cmd.transaction_type == TransactionType::Purchase {
            if !plan.active {
                return Err(PurchaseError::InvalidPlan(format!(
                    "plan {} is no longer offered",
                    plan.id
                )));
            }
            if self
                .purchases
                .find_active(&cmd.user_id, &feature.key)
                .await?
                .is_some()
            {
                return Err(PurchaseError::AlreadyEntitled {
                    user_id: cmd.user_id.to_string(),
                    feature_key: feature.key.to_string(),
                });
            }
        }

        if let Some(parent_id) = &cmd.parent_purchase_id {
            let parent = self.purchases.find_by_id(parent_id).await?.ok_or_else(|| {
                PurchaseError::invalid_input("parent_purchase_id", "parent purchase does not exist")
            })?;
            if parent.user_id != cmd.user_id || parent.feature_key != feature.key {
                return Err(PurchaseError::invalid_input(
                    "parent_purchase_id",
                    "parent purchase belongs to a different user or feature",
                ));
            }
        }

        let now = Timestamp::now();
        let mut record = Purchase::new_pending(
            PurchaseId::new(),
            cmd.user_id,
            &plan,
            cmd.gateway_id,
            cmd.transaction_type,
            cmd.parent_purchase_id,
            now,
        )
        .with_client_ip(cmd.client_ip);
        record.backfill(&cmd.payment);
        let id = record.id;

        match cmd.transaction_type.initial_status() {
            PurchaseStatus::Failed => {
                let reason = cmd
                    .failure_reason
                    .unwrap_or_else(|| format!("{} reported by gateway", cmd.transaction_type));
                record.fail(reason, None, now)?;
                self.purchases.insert(&record).await?;
                tracing::info!(
                    purchase_id = %id,
                    user_id = %record.user_id,
                    transaction_type = %record.transaction_type,
                    "failed record created"
                );
                self.notify(PurchaseInitiated::from_record(&record).to_envelope())
                    .await;
                self.notify(PurchaseFailed::from_record(&record).to_envelope())
                    .await;
            }
            PurchaseStatus::Active => {
                self.purchases.insert(&record).await?;
                self.notify(PurchaseInitiated::from_record(&record).to_envelope())
                    .await;
                if let Err(err) = self.complete_activation(record, &cmd.payment).await {
                    tracing::warn!(
                        purchase_id = %id,
                        error = %err,
                        "direct activation failed; record left failed"
                    );
                    return Err(err);
                }
            }
            _ => {
                let first_purchase = cmd.transaction_type == TransactionType::Purchase
                    && record.parent_purchase_id.is_none();
                let kind = feature.credential_kind;
                if first_purchase && kind.requires_credential() {
                    match self.credentials.generate_unique_key(kind, Some(&id)).await {
                        Ok(value) => record.assign_credential(kind, value),
                        Err(err) => tracing::warn!(
                            purchase_id = %id,
                            error = %err,
                            "inline credential generation failed; deferring to activation"
                        ),
                    }
                }
                self.purchases.insert(&record).await?;
                tracing::info!(
                    purchase_id = %id,
                    user_id = %record.user_id,
                    plan_id = %record.plan_id,
                    gateway = %record.gateway_id,
                    "purchase initiated"
                );
                self.notify(PurchaseInitiated::from_record(&record).to_envelope())
                    .await;
            }
        }

        Ok(id)
    }
}
