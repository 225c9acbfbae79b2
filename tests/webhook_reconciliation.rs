//! Signed provider deliveries driven through the reconciliation pipeline.

mod common;

use serde_json::{json, Value};

use common::{app, feature, plan, razorpay_request, stripe_request, user, TestApp};

use entitlement_engine::application::{ActivatePurchaseCommand, InitiatePurchaseCommand, ReconcileOutcome};
use entitlement_engine::domain::foundation::{GatewayId, PurchaseId};
use entitlement_engine::domain::gateway::{WebhookError, WebhookRequest};
use entitlement_engine::domain::purchase::{PurchaseStatus, TransactionType};
use entitlement_engine::ports::WebhookEventRepository;

async fn pending(app: &TestApp, who: &str, gateway: GatewayId) -> PurchaseId {
    app.lifecycle
        .initiate_purchase(InitiatePurchaseCommand::new(user(who), plan("basic"), gateway))
        .await
        .unwrap()
}

fn checkout_completed(event_id: &str, purchase_id: PurchaseId) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": { "object": {
            "id": "cs_1",
            "object": "checkout.session",
            "metadata": { "purchase_id": purchase_id.to_string() },
            "payment_intent": "pi_1",
            "subscription": "sub_1",
            "customer": "cus_1",
            "amount_total": 900,
            "currency": "usd"
        }}
    })
}

fn invoice_paid(event_id: &str, payment_intent: &str, purchase_id: PurchaseId) -> Value {
    json!({
        "id": event_id,
        "type": "invoice.payment_succeeded",
        "created": 1_700_000_000,
        "data": { "object": {
            "id": format!("in_{}", payment_intent),
            "object": "invoice",
            "billing_reason": "subscription_cycle",
            "subscription": "sub_1",
            "payment_intent": { "id": payment_intent, "object": "payment_intent" },
            "subscription_details": { "metadata": { "purchase_id": purchase_id.to_string() } },
            "amount_paid": 900,
            "currency": "usd"
        }}
    })
}

// =============================================================================
// Stripe
// =============================================================================

#[tokio::test]
async fn checkout_completion_activates_and_redelivery_is_skipped() {
    let app = app();
    let id = pending(&app, "alice", GatewayId::stripe()).await;
    let payload = checkout_completed("evt_1", id);

    let first = app
        .reconciliation
        .handle("stripe", stripe_request(&payload))
        .await
        .unwrap();
    let redelivered = app
        .reconciliation
        .handle("stripe", stripe_request(&payload))
        .await
        .unwrap();

    assert_eq!(first, ReconcileOutcome::Activated(id));
    assert_eq!(redelivered, ReconcileOutcome::AlreadyProcessed);

    let record = app.lifecycle.get_purchase(&id).await.unwrap();
    assert_eq!(record.status, PurchaseStatus::Active);
    assert_eq!(record.transaction_id.as_deref(), Some("pi_1"));
    assert_eq!(record.gateway_subscription_id.as_deref(), Some("sub_1"));
    assert_eq!(record.gateway_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(record.amount_paid, Some(900));
    assert_eq!(app.events.events_of_type("purchase.activated.v1").len(), 1);
}

#[tokio::test]
async fn second_confirmation_under_a_new_event_id_changes_nothing() {
    let app = app();
    let id = pending(&app, "bob", GatewayId::stripe()).await;

    app.reconciliation
        .handle("stripe", stripe_request(&checkout_completed("evt_a", id)))
        .await
        .unwrap();
    let key = app.lifecycle.get_purchase(&id).await.unwrap().api_key;

    let outcome = app
        .reconciliation
        .handle("stripe", stripe_request(&checkout_completed("evt_b", id)))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::AlreadyActive(id));
    assert_eq!(app.lifecycle.get_purchase(&id).await.unwrap().api_key, key);
}

#[tokio::test]
async fn renewal_charge_creates_one_successor() {
    let app = app();
    let id = pending(&app, "carol", GatewayId::stripe()).await;
    app.reconciliation
        .handle("stripe", stripe_request(&checkout_completed("evt_1", id)))
        .await
        .unwrap();
    let key = app.lifecycle.get_purchase(&id).await.unwrap().api_key;

    let renewed = app
        .reconciliation
        .handle("stripe", stripe_request(&invoice_paid("evt_2", "pi_2", id)))
        .await
        .unwrap();
    let ReconcileOutcome::Renewed { parent, renewal } = renewed else {
        panic!("expected a renewal, got {:?}", renewed);
    };
    assert_eq!(parent, id);

    // Same charge reported under another event id.
    let duplicate = app
        .reconciliation
        .handle("stripe", stripe_request(&invoice_paid("evt_3", "pi_2", id)))
        .await
        .unwrap();
    assert_eq!(duplicate, ReconcileOutcome::DuplicateRenewal(renewal));

    let successor = app.lifecycle.get_purchase(&renewal).await.unwrap();
    assert_eq!(successor.status, PurchaseStatus::Active);
    assert_eq!(successor.transaction_type, TransactionType::RenewalSuccess);
    assert_eq!(successor.transaction_id.as_deref(), Some("pi_2"));
    assert_eq!(successor.api_key, key);
    assert_eq!(
        app.lifecycle.get_purchase(&id).await.unwrap().status,
        PurchaseStatus::Expired
    );
    assert_eq!(app.purchases.len().await, 2);
}

#[tokio::test]
async fn renewal_that_failed_to_activate_is_retried_on_redelivery() {
    let app = app();
    let id = pending(&app, "cleo", GatewayId::stripe()).await;
    app.reconciliation
        .handle("stripe", stripe_request(&checkout_completed("evt_1", id)))
        .await
        .unwrap();
    let key = app.lifecycle.get_purchase(&id).await.unwrap().api_key;

    app.purchases.fail_next_supersede();
    let payload = invoice_paid("evt_2", "pi_2", id);
    let first = app
        .reconciliation
        .handle("stripe", stripe_request(&payload))
        .await
        .unwrap();
    assert!(matches!(first, ReconcileOutcome::Failed { .. }), "{:?}", first);
    assert_eq!(
        app.lifecycle.get_purchase(&id).await.unwrap().status,
        PurchaseStatus::Active
    );

    let retried = app
        .reconciliation
        .handle("stripe", stripe_request(&payload))
        .await
        .unwrap();
    let ReconcileOutcome::Renewed { parent, renewal } = retried else {
        panic!("expected the retry to renew, got {:?}", retried);
    };
    assert_eq!(parent, id);

    let successor = app.lifecycle.get_purchase(&renewal).await.unwrap();
    assert_eq!(successor.status, PurchaseStatus::Active);
    assert_eq!(successor.api_key, key);
    assert_eq!(
        app.lifecycle.get_purchase(&id).await.unwrap().status,
        PurchaseStatus::Expired
    );

    // Once renewed, the same charge is a plain duplicate.
    let again = app
        .reconciliation
        .handle("stripe", stripe_request(&invoice_paid("evt_3", "pi_2", id)))
        .await
        .unwrap();
    assert_eq!(again, ReconcileOutcome::DuplicateRenewal(renewal));
}

#[tokio::test]
async fn subscription_deletion_cancels_the_newest_active_record() {
    let app = app();
    let id = pending(&app, "dave", GatewayId::stripe()).await;
    app.reconciliation
        .handle("stripe", stripe_request(&checkout_completed("evt_1", id)))
        .await
        .unwrap();
    let ReconcileOutcome::Renewed { renewal, .. } = app
        .reconciliation
        .handle("stripe", stripe_request(&invoice_paid("evt_2", "pi_2", id)))
        .await
        .unwrap()
    else {
        panic!("renewal expected");
    };

    let deleted = json!({
        "id": "evt_4",
        "type": "customer.subscription.deleted",
        "created": 1_700_000_000,
        "data": { "object": { "id": "sub_1", "object": "subscription" } }
    });
    let outcome = app
        .reconciliation
        .handle("stripe", stripe_request(&deleted))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Terminated(renewal));
    assert!(!app.lifecycle.is_entitled(&user("dave"), &feature()).await.unwrap());
}

#[tokio::test]
async fn unlinked_payment_stays_retryable() {
    let app = app();
    let orphan = json!({
        "id": "evt_orphan",
        "type": "payment_intent.succeeded",
        "created": 1_700_000_000,
        "data": { "object": { "id": "pi_x", "object": "payment_intent" } }
    });

    let first = app
        .reconciliation
        .handle("stripe", stripe_request(&orphan))
        .await
        .unwrap();
    let retried = app
        .reconciliation
        .handle("stripe", stripe_request(&orphan))
        .await
        .unwrap();

    assert_eq!(first, ReconcileOutcome::Unresolved);
    assert_eq!(retried, ReconcileOutcome::Unresolved);
    let entry = app
        .ledger
        .find(&GatewayId::stripe(), "evt_orphan")
        .await
        .unwrap()
        .unwrap();
    assert!(!entry.is_final());
}

#[tokio::test]
async fn unhandled_event_type_is_acknowledged() {
    let app = app();
    let payload = json!({
        "id": "evt_misc",
        "type": "customer.created",
        "created": 1_700_000_000,
        "data": { "object": { "id": "cus_1", "object": "customer" } }
    });

    let outcome = app
        .reconciliation
        .handle("stripe", stripe_request(&payload))
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Ignored(_)));
    assert!(app.purchases.is_empty().await);
}

#[tokio::test]
async fn tampered_delivery_is_rejected_before_any_write() {
    let app = app();
    let id = pending(&app, "erin", GatewayId::stripe()).await;

    let signed = stripe_request(&checkout_completed("evt_1", id));
    let signature = signed.header("Stripe-Signature").unwrap().to_string();
    let tampered = WebhookRequest::new(
        checkout_completed("evt_1", PurchaseId::new())
            .to_string()
            .into_bytes(),
    )
    .with_header("Stripe-Signature", signature);

    let err = app
        .reconciliation
        .handle("stripe", tampered)
        .await
        .unwrap_err();

    assert!(matches!(err, WebhookError::InvalidSignature));
    assert!(app.ledger.is_empty().await);
    assert_eq!(
        app.lifecycle.get_purchase(&id).await.unwrap().status,
        PurchaseStatus::PendingPayment
    );
}

#[tokio::test]
async fn missing_signature_and_unknown_gateway_are_errors() {
    let app = app();
    let body = json!({ "id": "evt_1" }).to_string();

    let missing = app
        .reconciliation
        .handle("stripe", WebhookRequest::new(body.clone()))
        .await
        .unwrap_err();
    let unknown = app
        .reconciliation
        .handle("paypal", WebhookRequest::new(body))
        .await
        .unwrap_err();

    assert!(matches!(missing, WebhookError::MissingHeader(_)));
    assert!(matches!(unknown, WebhookError::UnknownGateway(_)));
}

// =============================================================================
// Razorpay
// =============================================================================

fn subscription_charged(purchase_id: PurchaseId, paid_count: u32) -> Value {
    json!({
        "event": "subscription.charged",
        "payload": {
            "subscription": { "entity": {
                "id": "sub_r1",
                "paid_count": paid_count,
                "notes": { "purchase_id": purchase_id.to_string() }
            }}
        }
    })
}

#[tokio::test]
async fn razorpay_capture_activates_the_purchase() {
    let app = app();
    let id = pending(&app, "frank", GatewayId::razorpay()).await;
    let payload = json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": "pay_1", "amount": 49900, "currency": "inr",
            "notes": { "purchase_id": id.to_string() }
        }}}
    });

    let outcome = app
        .reconciliation
        .handle("razorpay", razorpay_request("rzp_evt_1", &payload))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Activated(id));
    let record = app.lifecycle.get_purchase(&id).await.unwrap();
    assert_eq!(record.transaction_id.as_deref(), Some("pay_1"));
    assert_eq!(record.currency.as_deref(), Some("INR"));
}

#[tokio::test]
async fn razorpay_failed_payment_records_the_reason() {
    let app = app();
    let id = pending(&app, "gina", GatewayId::razorpay()).await;
    let payload = json!({
        "event": "payment.failed",
        "payload": { "payment": { "entity": {
            "id": "pay_2",
            "error_description": "Payment was unsuccessful",
            "notes": { "purchase_id": id.to_string() }
        }}}
    });

    let outcome = app
        .reconciliation
        .handle("razorpay", razorpay_request("rzp_evt_2", &payload))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::FailureRecorded(id));
    let record = app.lifecycle.get_purchase(&id).await.unwrap();
    assert_eq!(record.status, PurchaseStatus::Failed);
    assert_eq!(
        record.failure_reason.as_deref(),
        Some("Payment was unsuccessful")
    );
}

#[tokio::test]
async fn razorpay_subscription_charges_activate_then_renew() {
    let app = app();
    let id = pending(&app, "hank", GatewayId::razorpay()).await;

    let first = app
        .reconciliation
        .handle(
            "razorpay",
            razorpay_request("rzp_evt_3", &subscription_charged(id, 1)),
        )
        .await
        .unwrap();
    assert_eq!(first, ReconcileOutcome::Activated(id));

    let second = app
        .reconciliation
        .handle(
            "razorpay",
            razorpay_request("rzp_evt_4", &subscription_charged(id, 2)),
        )
        .await
        .unwrap();
    let ReconcileOutcome::Renewed { renewal, .. } = second else {
        panic!("expected a renewal, got {:?}", second);
    };

    let successor = app.lifecycle.get_purchase(&renewal).await.unwrap();
    assert_eq!(successor.transaction_id.as_deref(), Some("sub_r1:2"));
    assert_eq!(successor.parent_purchase_id, Some(id));
}

#[tokio::test]
async fn razorpay_halt_after_activation_keeps_the_entitlement() {
    let app = app();
    let id = pending(&app, "ivy", GatewayId::razorpay()).await;
    app.lifecycle
        .activate_purchase(ActivatePurchaseCommand::new(id))
        .await
        .unwrap();

    let halted = json!({
        "event": "subscription.halted",
        "payload": { "subscription": { "entity": {
            "id": "sub_r2", "paid_count": 3,
            "notes": { "purchase_id": id.to_string() }
        }}}
    });
    let outcome = app
        .reconciliation
        .handle("razorpay", razorpay_request("rzp_evt_5", &halted))
        .await
        .unwrap();

    let ReconcileOutcome::FailureRecorded(failed_id) = outcome else {
        panic!("expected a failed renewal, got {:?}", outcome);
    };
    assert_ne!(failed_id, id);
    let failed = app.lifecycle.get_purchase(&failed_id).await.unwrap();
    assert_eq!(failed.transaction_type, TransactionType::RenewalFailure);
    assert_eq!(failed.status, PurchaseStatus::Failed);
    assert!(app.lifecycle.is_entitled(&user("ivy"), &feature()).await.unwrap());
}
