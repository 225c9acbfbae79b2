//! Shared wiring for integration tests: in-memory adapters behind the real
//! lifecycle manager and reconciliation service.

#![allow(dead_code)]

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;

use entitlement_engine::adapters::events::InMemoryEventBus;
use entitlement_engine::adapters::memory::{
    InMemoryPlanCatalog, InMemoryPurchaseRepository, InMemoryWebhookEventRepository,
};
use entitlement_engine::application::{
    CredentialManager, LifecycleManager, RazorpayReconciler, ReconcilerRegistry,
    ReconciliationService, StripeReconciler,
};
use entitlement_engine::domain::foundation::{FeatureKey, PlanId, Timestamp, UserId};
use entitlement_engine::domain::gateway::{
    sign_razorpay_payload, sign_stripe_payload, WebhookRequest,
};
use entitlement_engine::domain::purchase::{CredentialKind, Feature, Plan};

pub const STRIPE_SECRET: &str = "whsec_integration";
pub const RAZORPAY_SECRET: &str = "rzp_integration";

pub struct TestApp {
    pub lifecycle: Arc<LifecycleManager>,
    pub reconciliation: Arc<ReconciliationService>,
    pub purchases: Arc<InMemoryPurchaseRepository>,
    pub ledger: Arc<InMemoryWebhookEventRepository>,
    pub events: Arc<InMemoryEventBus>,
}

pub fn catalog() -> InMemoryPlanCatalog {
    InMemoryPlanCatalog::new()
        .with_feature(Feature::new(feature(), "Geo API", CredentialKind::ApiKey))
        .with_feature(Feature::new(
            FeatureKey::new("desktop").unwrap(),
            "Desktop App",
            CredentialKind::LicenseKey,
        ))
        .with_plan(Plan::recurring(plan("basic"), feature(), "Basic", 900, "USD", 30).unwrap())
        .with_plan(
            Plan::recurring(plan("pro"), feature(), "Pro", 2900, "USD", 30)
                .unwrap()
                .with_limits(Some(10_000), None),
        )
        .with_plan(
            Plan::one_time(
                plan("desktop-lifetime"),
                FeatureKey::new("desktop").unwrap(),
                "Desktop Lifetime",
                4900,
                "USD",
            )
            .unwrap(),
        )
}

pub fn app() -> TestApp {
    let purchases = Arc::new(InMemoryPurchaseRepository::new());
    let ledger = Arc::new(InMemoryWebhookEventRepository::new());
    let events = Arc::new(InMemoryEventBus::new());

    let lifecycle = Arc::new(LifecycleManager::new(
        purchases.clone(),
        Arc::new(catalog()),
        CredentialManager::new(purchases.clone(), 10),
        events.clone(),
    ));

    let registry = ReconcilerRegistry::new()
        .register(Arc::new(StripeReconciler::new(SecretString::new(
            STRIPE_SECRET.to_string(),
        ))))
        .register(Arc::new(RazorpayReconciler::new(SecretString::new(
            RAZORPAY_SECRET.to_string(),
        ))));

    let reconciliation = Arc::new(ReconciliationService::new(
        registry,
        lifecycle.clone(),
        purchases.clone(),
        ledger.clone(),
    ));

    TestApp {
        lifecycle,
        reconciliation,
        purchases,
        ledger,
        events,
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn plan(id: &str) -> PlanId {
    PlanId::new(id).unwrap()
}

pub fn feature() -> FeatureKey {
    FeatureKey::new("geo-api").unwrap()
}

/// Signs `payload` the way Stripe does, stamped with the current time.
pub fn stripe_request(payload: &Value) -> WebhookRequest {
    let body = payload.to_string().into_bytes();
    let signature = sign_stripe_payload(
        STRIPE_SECRET.as_bytes(),
        Timestamp::now().as_unix_secs(),
        &body,
    )
    .unwrap();
    WebhookRequest::new(body).with_header("Stripe-Signature", signature)
}

pub fn razorpay_request(event_id: &str, payload: &Value) -> WebhookRequest {
    let body = payload.to_string().into_bytes();
    let signature = sign_razorpay_payload(RAZORPAY_SECRET.as_bytes(), &body).unwrap();
    WebhookRequest::new(body)
        .with_header("X-Razorpay-Signature", signature)
        .with_header("X-Razorpay-Event-Id", event_id)
}
