//! Shared reconciliation pipeline.
//!
//! verify → ledger check → resolve → lifecycle call → ledger record.
//! Everything after verification is acknowledged to the provider; what
//! happened is kept in the delivery ledger and the logs.

use std::sync::Arc;

use crate::domain::foundation::{PurchaseId, StateMachine, Timestamp};
use crate::domain::gateway::{GatewayEvent, GatewayEventKind, WebhookError, WebhookRequest};
use crate::domain::purchase::{Purchase, PurchaseError, PurchaseStatus, TransactionType};
use crate::ports::{PurchaseRepository, WebhookEventRecord, WebhookEventRepository};

use super::super::lifecycle::{
    ActivatePurchaseCommand, ActivationResult, InitiatePurchaseCommand, LifecycleManager,
    RecordFailureCommand, TerminatePurchaseCommand, TerminationResult,
};
use super::{GatewayReconciler, ReconcileOutcome, ReconcilerRegistry};

/// Turns verified provider deliveries into lifecycle calls.
pub struct ReconciliationService {
    registry: ReconcilerRegistry,
    lifecycle: Arc<LifecycleManager>,
    purchases: Arc<dyn PurchaseRepository>,
    ledger: Arc<dyn WebhookEventRepository>,
}

impl ReconciliationService {
    pub fn new(
        registry: ReconcilerRegistry,
        lifecycle: Arc<LifecycleManager>,
        purchases: Arc<dyn PurchaseRepository>,
        ledger: Arc<dyn WebhookEventRepository>,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            purchases,
            ledger,
        }
    }

    /// Handles one delivery for `gateway`.
    ///
    /// # Errors
    ///
    /// Only for deliveries that must be rejected: unknown gateway, bad
    /// signature, unparseable payload. Every other case is an `Ok` outcome.
    pub async fn handle(
        &self,
        gateway: &str,
        request: WebhookRequest,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let reconciler = self
            .registry
            .get(gateway)
            .ok_or_else(|| WebhookError::UnknownGateway(gateway.to_string()))?;

        let event = reconciler.verify_and_parse(&request).map_err(|err| {
            tracing::warn!(gateway = %gateway, error = %err, "webhook rejected");
            err
        })?;

        match self.ledger.find(&event.gateway, &event.event_id).await {
            Ok(Some(previous)) if previous.is_final() => {
                tracing::debug!(
                    gateway = %event.gateway,
                    event_id = %event.event_id,
                    outcome = %previous.outcome,
                    "delivery already processed"
                );
                return Ok(ReconcileOutcome::AlreadyProcessed);
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(
                gateway = %event.gateway,
                event_id = %event.event_id,
                error = %err,
                "delivery ledger lookup failed; processing anyway"
            ),
        }

        let outcome = self.dispatch(reconciler.as_ref(), &event).await;
        self.log_outcome(&event, &outcome);
        self.record(&event, &outcome).await;
        Ok(outcome)
    }

    async fn dispatch(
        &self,
        reconciler: &dyn GatewayReconciler,
        event: &GatewayEvent,
    ) -> ReconcileOutcome {
        let result = match event.kind {
            GatewayEventKind::Unhandled => {
                return ReconcileOutcome::Ignored(format!("{} is not handled", event.event_type))
            }
            GatewayEventKind::PaymentSucceeded => self.on_payment_succeeded(reconciler, event).await,
            GatewayEventKind::PaymentFailed => self.on_payment_failed(reconciler, event).await,
            GatewayEventKind::RenewalCharged => self.on_renewal_charged(reconciler, event).await,
            GatewayEventKind::RenewalFailed => self.on_renewal_failed(reconciler, event).await,
            GatewayEventKind::SubscriptionCancelled => {
                self.on_subscription_ended(reconciler, event, PurchaseStatus::Cancelled)
                    .await
            }
            GatewayEventKind::SubscriptionExpired => {
                self.on_subscription_ended(reconciler, event, PurchaseStatus::Expired)
                    .await
            }
        };
        result.unwrap_or_else(|err| ReconcileOutcome::failed(None, err))
    }

    async fn on_payment_succeeded(
        &self,
        reconciler: &dyn GatewayReconciler,
        event: &GatewayEvent,
    ) -> Result<ReconcileOutcome, PurchaseError> {
        let Some(record) = self.resolve(reconciler, event).await? else {
            return Ok(ReconcileOutcome::Unresolved);
        };
        Ok(self.activate(&record, event).await)
    }

    async fn activate(&self, record: &Purchase, event: &GatewayEvent) -> ReconcileOutcome {
        let cmd = ActivatePurchaseCommand::new(record.id).with_payment(event.payment.clone());
        match self.lifecycle.activate_purchase(cmd).await {
            Ok(ActivationResult::Activated(p)) => ReconcileOutcome::Activated(p.id),
            Ok(ActivationResult::AlreadyActive(p)) => ReconcileOutcome::AlreadyActive(p.id),
            Err(PurchaseError::NotPendingPayment { status, .. }) => {
                ReconcileOutcome::Ignored(format!("purchase {} is {}", record.id, status))
            }
            Err(err) => ReconcileOutcome::failed(Some(record.id), err),
        }
    }

    async fn on_payment_failed(
        &self,
        reconciler: &dyn GatewayReconciler,
        event: &GatewayEvent,
    ) -> Result<ReconcileOutcome, PurchaseError> {
        let Some(record) = self.resolve(reconciler, event).await? else {
            return Ok(ReconcileOutcome::Unresolved);
        };

        let cmd = RecordFailureCommand {
            purchase_id: record.id,
            reason: failure_reason(event),
            transaction_ref: event.payment.transaction_ref.clone(),
        };
        Ok(match self.lifecycle.record_purchase_failure(cmd).await {
            Ok(_) => ReconcileOutcome::FailureRecorded(record.id),
            Err(PurchaseError::NotPendingPayment { status, .. }) => ReconcileOutcome::Ignored(
                format!("purchase {} is {}; failure not applied", record.id, status),
            ),
            Err(err) => ReconcileOutcome::failed(Some(record.id), err),
        })
    }

    async fn on_renewal_charged(
        &self,
        reconciler: &dyn GatewayReconciler,
        event: &GatewayEvent,
    ) -> Result<ReconcileOutcome, PurchaseError> {
        let Some(resolved) = self.resolve(reconciler, event).await? else {
            return Ok(ReconcileOutcome::Unresolved);
        };
        // First charge reported as a cycle charge; confirm the pending record.
        if resolved.status == PurchaseStatus::PendingPayment {
            return Ok(self.activate(&resolved, event).await);
        }

        let reference = event.transaction_reference().to_string();
        if let Some(existing) = self
            .find_renewal(event, &reference, TransactionType::RenewalSuccess)
            .await?
        {
            return Ok(ReconcileOutcome::DuplicateRenewal(existing));
        }

        let parent = self.renewal_parent(resolved).await?;
        let mut payment = event.payment.clone();
        payment.transaction_ref = Some(reference.clone());
        let cmd = InitiatePurchaseCommand::new(
            parent.user_id.clone(),
            parent.plan_id.clone(),
            event.gateway.clone(),
        )
        .with_type(TransactionType::RenewalSuccess)
        .with_parent(parent.id)
        .with_payment(payment);

        match self.lifecycle.initiate_purchase(cmd).await {
            Ok(id) => {
                let renewal = self.lifecycle.get_purchase(&id).await?;
                if renewal.status == PurchaseStatus::Active {
                    Ok(ReconcileOutcome::Renewed {
                        parent: parent.id,
                        renewal: id,
                    })
                } else {
                    let reason = renewal
                        .failure_reason
                        .unwrap_or_else(|| "renewal did not activate".to_string());
                    Ok(ReconcileOutcome::failed(Some(id), reason))
                }
            }
            Err(PurchaseError::DuplicateTransaction(_)) => {
                let existing = self
                    .find_renewal(event, &reference, TransactionType::RenewalSuccess)
                    .await?;
                Ok(ReconcileOutcome::DuplicateRenewal(existing.unwrap_or(parent.id)))
            }
            Err(err) => Ok(ReconcileOutcome::failed(Some(parent.id), err)),
        }
    }

    async fn on_renewal_failed(
        &self,
        reconciler: &dyn GatewayReconciler,
        event: &GatewayEvent,
    ) -> Result<ReconcileOutcome, PurchaseError> {
        let Some(resolved) = self.resolve(reconciler, event).await? else {
            return Ok(ReconcileOutcome::Unresolved);
        };

        let reference = event.transaction_reference().to_string();
        if let Some(existing) = self
            .find_renewal(event, &reference, TransactionType::RenewalFailure)
            .await?
        {
            return Ok(ReconcileOutcome::DuplicateRenewal(existing));
        }

        // The still-active record stays untouched; the failure gets its own row.
        let parent = self.renewal_parent(resolved).await?;
        let mut payment = event.payment.clone();
        payment.transaction_ref = Some(reference);
        let cmd = InitiatePurchaseCommand::new(
            parent.user_id.clone(),
            parent.plan_id.clone(),
            event.gateway.clone(),
        )
        .with_type(TransactionType::RenewalFailure)
        .with_parent(parent.id)
        .with_payment(payment)
        .with_failure_reason(failure_reason(event));

        Ok(match self.lifecycle.initiate_purchase(cmd).await {
            Ok(id) => ReconcileOutcome::FailureRecorded(id),
            Err(PurchaseError::DuplicateTransaction(_)) => {
                ReconcileOutcome::DuplicateRenewal(parent.id)
            }
            Err(err) => ReconcileOutcome::failed(Some(parent.id), err),
        })
    }

    async fn on_subscription_ended(
        &self,
        reconciler: &dyn GatewayReconciler,
        event: &GatewayEvent,
        status: PurchaseStatus,
    ) -> Result<ReconcileOutcome, PurchaseError> {
        let by_subscription = match event.subscription_id() {
            Some(subscription_id) => {
                self.purchases
                    .find_latest_by_subscription(&event.gateway, subscription_id)
                    .await?
            }
            None => None,
        };
        let target = match by_subscription {
            Some(record) => Some(record),
            None => self.resolve(reconciler, event).await?,
        };
        let Some(mut target) = target else {
            return Ok(ReconcileOutcome::Unresolved);
        };

        // The newest row may be a failed renewal; the entitlement to end is
        // the active record of the same subscription.
        if target.status.is_terminal() {
            if let Some(active) = self
                .purchases
                .find_active(&target.user_id, &target.feature_key)
                .await?
            {
                if active.gateway_subscription_id == target.gateway_subscription_id {
                    target = active;
                }
            }
        }

        let cmd = TerminatePurchaseCommand {
            purchase_id: target.id,
            status,
            reason: Some(event.event_type.clone()),
        };
        Ok(match self.lifecycle.terminate_purchase(cmd).await {
            Ok(TerminationResult::Terminated(p)) => ReconcileOutcome::Terminated(p.id),
            Ok(TerminationResult::AlreadyTerminal(p)) => {
                ReconcileOutcome::Ignored(format!("purchase {} is already {}", p.id, p.status))
            }
            Err(err) => ReconcileOutcome::failed(Some(target.id), err),
        })
    }

    /// Links an event to a record, first hit wins:
    /// event metadata, stored subscription id, related object metadata,
    /// stored transaction id.
    async fn resolve(
        &self,
        reconciler: &dyn GatewayReconciler,
        event: &GatewayEvent,
    ) -> Result<Option<Purchase>, PurchaseError> {
        if let Some(found) = self.find_by_ref(event.purchase_ref.as_deref()).await? {
            return Ok(Some(found));
        }

        if let Some(subscription_id) = event.subscription_id() {
            if let Some(found) = self
                .purchases
                .find_latest_by_subscription(&event.gateway, subscription_id)
                .await?
            {
                return Ok(Some(found));
            }
        }

        if event.related_object_id.is_some() {
            match reconciler.related_purchase_ref(event).await {
                Ok(reference) => {
                    if let Some(found) = self.find_by_ref(reference.as_deref()).await? {
                        return Ok(Some(found));
                    }
                }
                Err(err) => tracing::warn!(
                    gateway = %event.gateway,
                    event_id = %event.event_id,
                    related_object_id = ?event.related_object_id,
                    error = %err,
                    "related object lookup failed"
                ),
            }
        }

        Ok(self
            .purchases
            .find_latest_by_transaction(&event.gateway, event.transaction_reference(), None)
            .await?)
    }

    async fn find_by_ref(&self, reference: Option<&str>) -> Result<Option<Purchase>, PurchaseError> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        match reference.parse::<PurchaseId>() {
            Ok(id) => Ok(self.purchases.find_by_id(&id).await?),
            Err(_) => {
                tracing::debug!(reference = %reference, "purchase reference is not a purchase id");
                Ok(None)
            }
        }
    }

    /// A renewal that never activated is not a duplicate: the charge is
    /// still owed to the user, so the redelivery retries it.
    async fn find_renewal(
        &self,
        event: &GatewayEvent,
        reference: &str,
        transaction_type: TransactionType,
    ) -> Result<Option<PurchaseId>, PurchaseError> {
        Ok(self
            .purchases
            .find_latest_by_transaction(&event.gateway, reference, Some(transaction_type))
            .await?
            .filter(|record| {
                transaction_type != TransactionType::RenewalSuccess
                    || record.status != PurchaseStatus::Failed
            })
            .map(|record| record.id))
    }

    /// The current active record of the same (user, feature), else `resolved`.
    async fn renewal_parent(&self, resolved: Purchase) -> Result<Purchase, PurchaseError> {
        Ok(self
            .purchases
            .find_active(&resolved.user_id, &resolved.feature_key)
            .await?
            .unwrap_or(resolved))
    }

    fn log_outcome(&self, event: &GatewayEvent, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Unresolved => tracing::warn!(
                gateway = %event.gateway,
                event_id = %event.event_id,
                event_type = %event.event_type,
                subscription_id = ?event.subscription_id(),
                transaction_ref = %event.transaction_reference(),
                "unresolved webhook linkage"
            ),
            ReconcileOutcome::Failed { purchase_id, reason } => tracing::warn!(
                gateway = %event.gateway,
                event_id = %event.event_id,
                event_type = %event.event_type,
                purchase_id = ?purchase_id.map(|id| id.to_string()),
                reason = %reason,
                "webhook processing failed"
            ),
            _ => tracing::info!(
                gateway = %event.gateway,
                event_id = %event.event_id,
                event_type = %event.event_type,
                outcome = outcome.label(),
                purchase_id = ?outcome.purchase_id().map(|id| id.to_string()),
                "webhook reconciled"
            ),
        }
    }

    async fn record(&self, event: &GatewayEvent, outcome: &ReconcileOutcome) {
        let record = WebhookEventRecord {
            gateway_id: event.gateway.clone(),
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            outcome: outcome.label().to_string(),
            detail: outcome.detail(),
            purchase_id: outcome.purchase_id(),
            received_at: Timestamp::now(),
        };
        if let Err(err) = self.ledger.save(record).await {
            tracing::warn!(
                gateway = %event.gateway,
                event_id = %event.event_id,
                error = %err,
                "failed to record webhook delivery"
            );
        }
    }
}

fn failure_reason(event: &GatewayEvent) -> String {
    event
        .failure_reason
        .clone()
        .unwrap_or_else(|| event.event_type.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use serde_json::json;

    use crate::adapters::memory::InMemoryWebhookEventRepository;
    use crate::application::lifecycle::test_support::{harness, user};
    use crate::domain::foundation::{DomainError, ErrorCode, GatewayId, PlanId};
    use crate::domain::gateway::sign_stripe_payload;
    use crate::domain::purchase::PaymentDetails;
    use crate::ports::GatewayClient;

    use super::super::StripeReconciler;

    const SECRET: &str = "whsec_pipeline";

    /// Answers invoice lookups from a fixed table; `None` means outage.
    struct StubInvoices(Option<(String, String)>);

    #[async_trait]
    impl GatewayClient for StubInvoices {
        fn gateway(&self) -> GatewayId {
            GatewayId::stripe()
        }

        async fn related_purchase_ref(&self, object_id: &str) -> Result<Option<String>, DomainError> {
            match &self.0 {
                Some((invoice, purchase)) if invoice == object_id => Ok(Some(purchase.clone())),
                Some(_) => Ok(None),
                None => Err(DomainError::new(ErrorCode::InternalError, "stripe unreachable")),
            }
        }
    }

    struct Setup {
        service: ReconciliationService,
        lifecycle: Arc<LifecycleManager>,
    }

    fn setup(client: StubInvoices) -> Setup {
        let h = harness();
        let lifecycle = Arc::new(h.manager);
        let reconciler = StripeReconciler::new(SecretString::new(SECRET.to_string()))
            .with_client(Arc::new(client));
        let service = ReconciliationService::new(
            ReconcilerRegistry::new().register(Arc::new(reconciler)),
            lifecycle.clone(),
            h.purchases,
            Arc::new(InMemoryWebhookEventRepository::new()),
        );
        Setup { service, lifecycle }
    }

    fn signed(payload: serde_json::Value) -> WebhookRequest {
        let body = payload.to_string().into_bytes();
        let signature =
            sign_stripe_payload(SECRET.as_bytes(), Timestamp::now().as_unix_secs(), &body).unwrap();
        WebhookRequest::new(body).with_header("Stripe-Signature", signature)
    }

    fn intent_succeeded(event_id: &str, intent_id: &str, invoice: Option<&str>) -> WebhookRequest {
        signed(json!({
            "id": event_id,
            "type": "payment_intent.succeeded",
            "created": 1_700_000_000,
            "data": { "object": {
                "id": intent_id,
                "object": "payment_intent",
                "invoice": invoice
            }}
        }))
    }

    async fn pending(lifecycle: &LifecycleManager, payment: PaymentDetails) -> PurchaseId {
        let cmd = InitiatePurchaseCommand::new(user(), PlanId::new("basic").unwrap(), GatewayId::stripe())
            .with_payment(payment);
        lifecycle.initiate_purchase(cmd).await.unwrap()
    }

    #[tokio::test]
    async fn resolves_through_the_related_invoice() {
        let h = harness();
        let lifecycle = Arc::new(h.manager);
        let id = pending(&lifecycle, PaymentDetails::default()).await;
        let service = ReconciliationService::new(
            ReconcilerRegistry::new().register(Arc::new(
                StripeReconciler::new(SecretString::new(SECRET.to_string())).with_client(Arc::new(
                    StubInvoices(Some(("in_9".to_string(), id.to_string()))),
                )),
            )),
            lifecycle.clone(),
            h.purchases,
            Arc::new(InMemoryWebhookEventRepository::new()),
        );

        let outcome = service
            .handle("stripe", intent_succeeded("evt_c", "pi_c", Some("in_9")))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Activated(id));
    }

    #[tokio::test]
    async fn lookup_outage_falls_through_to_stored_transaction() {
        let s = setup(StubInvoices(None));
        let id = pending(
            &s.lifecycle,
            PaymentDetails::default().with_transaction_ref("pi_d"),
        )
        .await;

        let outcome = s
            .service
            .handle("stripe", intent_succeeded("evt_d", "pi_d", Some("in_404")))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Activated(id));
        let record = s.lifecycle.get_purchase(&id).await.unwrap();
        assert_eq!(record.status, PurchaseStatus::Active);
    }

    #[tokio::test]
    async fn nothing_matches_leaves_records_untouched() {
        let s = setup(StubInvoices(Some(("in_other".to_string(), "x".to_string()))));
        let id = pending(&s.lifecycle, PaymentDetails::default()).await;

        let outcome = s
            .service
            .handle("stripe", intent_succeeded("evt_u", "pi_u", Some("in_9")))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unresolved);
        let record = s.lifecycle.get_purchase(&id).await.unwrap();
        assert_eq!(record.status, PurchaseStatus::PendingPayment);
    }
}
