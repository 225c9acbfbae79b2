//! Entitlement record aggregate.
//!
//! One row per instance of a user's right to use a feature under specific
//! plan terms. Records form lineage chains through `parent_purchase_id`
//! (purchase, renewal, renewal, ... or purchase, switch) and are never
//! deleted; history is kept by appending new records.
//!
//! # Design Decisions
//!
//! - **Snapshot plans**: the plan is copied onto the record at creation
//! - **Money in cents**: `amount_paid` is stored as i64 minor units
//! - **Nullable expiry**: `expiry_date = None` means the entitlement never expires

use crate::domain::foundation::{
    DomainError, ErrorCode, FeatureKey, GatewayId, PlanId, PurchaseId, StateMachine, Timestamp,
    UserId,
};
use serde::{Deserialize, Serialize};

use super::{CredentialKind, PaymentDetails, Plan, PurchaseStatus, TransactionType};

/// Entitlement record.
///
/// # Invariants
///
/// - Status transitions follow the `PurchaseStatus` state machine
/// - `expiry_date` is `None` iff the plan is one-time (once active)
/// - A parent, if set, belongs to the same user and feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,

    pub plan_id: PlanId,
    pub feature_key: FeatureKey,

    /// Plan terms as they were when this record was created.
    pub plan_snapshot: Plan,

    pub api_key: Option<String>,
    pub license_key: Option<String>,

    pub status: PurchaseStatus,
    pub transaction_type: TransactionType,

    pub purchase_date: Timestamp,
    pub activation_date: Option<Timestamp>,
    pub expiry_date: Option<Timestamp>,
    pub cancellation_effective_date: Option<Timestamp>,
    pub failure_timestamp: Option<Timestamp>,
    pub failure_reason: Option<String>,

    pub gateway_id: GatewayId,
    pub transaction_id: Option<String>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub gateway_payment_method_id: Option<String>,

    pub requests_per_day: Option<i64>,
    pub requests_per_month: Option<i64>,

    pub parent_purchase_id: Option<PurchaseId>,

    /// Target plan of an operator-approved switch that is waiting for approval.
    pub pending_switch_plan_id: Option<PlanId>,

    pub auto_renew: bool,
    pub amount_paid: Option<i64>,
    pub currency: Option<String>,

    /// Address of the client that started the checkout, if known.
    pub client_ip: Option<String>,

    pub updated_at: Timestamp,
}

impl Purchase {
    /// Creates a new record awaiting payment.
    pub fn new_pending(
        id: PurchaseId,
        user_id: UserId,
        plan: &Plan,
        gateway_id: GatewayId,
        transaction_type: TransactionType,
        parent_purchase_id: Option<PurchaseId>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            plan_id: plan.id.clone(),
            feature_key: plan.feature_key.clone(),
            plan_snapshot: plan.clone(),
            api_key: None,
            license_key: None,
            status: PurchaseStatus::PendingPayment,
            transaction_type,
            purchase_date: now,
            activation_date: None,
            expiry_date: None,
            cancellation_effective_date: None,
            failure_timestamp: None,
            failure_reason: None,
            gateway_id,
            transaction_id: None,
            gateway_subscription_id: None,
            gateway_customer_id: None,
            gateway_payment_method_id: None,
            requests_per_day: plan.requests_per_day,
            requests_per_month: plan.requests_per_month,
            parent_purchase_id,
            pending_switch_plan_id: None,
            auto_renew: false,
            amount_paid: Some(plan.price_cents),
            currency: Some(plan.currency.clone()),
            client_ip: None,
            updated_at: now,
        }
    }

    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip;
        self
    }

    /// The credential currently held by this record, whichever kind it is.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().or(self.license_key.as_deref())
    }

    /// Stores a credential in the column for its kind.
    pub fn assign_credential(&mut self, kind: CredentialKind, value: String) {
        match kind {
            CredentialKind::ApiKey => self.api_key = Some(value),
            CredentialKind::LicenseKey => self.license_key = Some(value),
            CredentialKind::None => {}
        }
    }

    /// Returns true if this record grants access at `now`.
    pub fn is_entitled(&self, now: Timestamp) -> bool {
        self.status == PurchaseStatus::Active
            && self.expiry_date.map_or(true, |expiry| expiry.is_after(&now))
    }

    /// Moves a pending record to active after payment is confirmed.
    ///
    /// Recomputes expiry from the plan snapshot, clears failure fields and
    /// applies every gateway reference present in `payment`.
    ///
    /// # Errors
    ///
    /// Returns error if the record is not pending.
    pub fn activate(&mut self, now: Timestamp, payment: &PaymentDetails) -> Result<(), DomainError> {
        self.transition_to(PurchaseStatus::Active)?;
        self.activation_date = Some(now);
        self.expiry_date = self.plan_snapshot.expiry_from(now);
        self.auto_renew = self.plan_snapshot.is_recurring();
        self.failure_timestamp = None;
        self.failure_reason = None;
        self.apply_payment(payment);
        self.updated_at = now;
        Ok(())
    }

    /// Fills gateway references that are still missing, never overwriting.
    ///
    /// Returns true if anything changed.
    pub fn backfill(&mut self, payment: &PaymentDetails) -> bool {
        let mut changed = false;
        changed |= fill(&mut self.transaction_id, &payment.transaction_ref);
        changed |= fill(&mut self.gateway_subscription_id, &payment.gateway_subscription_id);
        changed |= fill(&mut self.gateway_customer_id, &payment.gateway_customer_id);
        changed |= fill(
            &mut self.gateway_payment_method_id,
            &payment.gateway_payment_method_id,
        );
        changed |= fill(&mut self.amount_paid, &payment.amount_cents);
        changed |= fill(&mut self.currency, &payment.currency);
        changed
    }

    /// Records a payment failure.
    ///
    /// # Errors
    ///
    /// Returns error unless the record is pending.
    pub fn fail(
        &mut self,
        reason: impl Into<String>,
        transaction_ref: Option<&str>,
        now: Timestamp,
    ) -> Result<(), DomainError> {
        self.transition_to(PurchaseStatus::Failed)?;
        self.failure_timestamp = Some(now);
        self.failure_reason = Some(reason.into());
        self.auto_renew = false;
        if self.transaction_id.is_none() {
            self.transaction_id = transaction_ref.map(str::to_string);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Retires this record because a successor took over.
    ///
    /// Returns the credential the record held; it is cleared here so the
    /// successor can take it without a uniqueness clash.
    ///
    /// # Errors
    ///
    /// Returns error if the record is not active.
    pub fn supersede(
        &mut self,
        terminal: PurchaseStatus,
        now: Timestamp,
    ) -> Result<Option<String>, DomainError> {
        self.transition_to(terminal)?;
        self.auto_renew = false;
        self.pending_switch_plan_id = None;
        Ok(self.release_credential(now))
    }

    /// Clears and returns the credential without touching the status.
    ///
    /// Used when a successor inherits a key from a record that already
    /// ended, e.g. a renewal arriving after a cancellation.
    pub fn release_credential(&mut self, now: Timestamp) -> Option<String> {
        let released = self.api_key.take().or_else(|| self.license_key.take());
        if released.is_some() {
            self.updated_at = now;
        }
        released
    }

    /// Re-runs activation on an already active record (forced confirmation).
    ///
    /// Expiry restarts from `now`; gateway references in `payment` overwrite
    /// the stored ones.
    ///
    /// # Errors
    ///
    /// Returns error if the record is not active.
    pub fn refresh_activation(
        &mut self,
        now: Timestamp,
        payment: &PaymentDetails,
    ) -> Result<(), DomainError> {
        if self.status != PurchaseStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot refresh purchase in {} state", self.status),
            )
            .with_detail("purchase_id", self.id.to_string())
            .with_detail("status", self.status.as_str()));
        }
        self.activation_date = Some(now);
        self.expiry_date = self.plan_snapshot.expiry_from(now);
        self.apply_payment(payment);
        self.updated_at = now;
        Ok(())
    }

    /// Ends the record directly at the provider's request (cancel or expiry).
    ///
    /// The credential stays on the record.
    ///
    /// # Errors
    ///
    /// Returns error if `status` is not cancelled/expired or the record is terminal.
    pub fn terminate(&mut self, status: PurchaseStatus, now: Timestamp) -> Result<(), DomainError> {
        if !matches!(status, PurchaseStatus::Cancelled | PurchaseStatus::Expired) {
            return Err(DomainError::validation(
                "status",
                format!("{} is not a termination status", status),
            ));
        }
        self.transition_to(status)?;
        self.auto_renew = false;
        self.cancellation_effective_date = Some(now);
        self.pending_switch_plan_id = None;
        self.updated_at = now;
        Ok(())
    }

    /// Marks this active record as waiting for an operator-approved switch.
    ///
    /// # Errors
    ///
    /// Returns error if the record is not active or the target is the current plan.
    pub fn request_switch(&mut self, target: PlanId, now: Timestamp) -> Result<(), DomainError> {
        if self.status != PurchaseStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot switch purchase in {} state", self.status),
            ));
        }
        if target == self.plan_id {
            return Err(DomainError::validation(
                "target_plan_id",
                "Target plan is the current plan",
            ));
        }
        self.pending_switch_plan_id = Some(target);
        self.updated_at = now;
        Ok(())
    }

    fn apply_payment(&mut self, payment: &PaymentDetails) {
        overwrite(&mut self.transaction_id, &payment.transaction_ref);
        overwrite(&mut self.gateway_subscription_id, &payment.gateway_subscription_id);
        overwrite(&mut self.gateway_customer_id, &payment.gateway_customer_id);
        overwrite(
            &mut self.gateway_payment_method_id,
            &payment.gateway_payment_method_id,
        );
        overwrite(&mut self.amount_paid, &payment.amount_cents);
        overwrite(&mut self.currency, &payment.currency);
    }

    fn transition_to(&mut self, target: PurchaseStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition purchase from {} to {}",
                    self.status, target
                ),
            )
            .with_detail("purchase_id", self.id.to_string())
            .with_detail("status", self.status.as_str())
        })?;
        Ok(())
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) -> bool {
    if slot.is_none() && value.is_some() {
        *slot = value.clone();
        true
    } else {
        false
    }
}

fn overwrite<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        *slot = value.clone();
    }
}
