//! Razorpay webhook event types.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use super::{GatewayEvent, GatewayEventKind, WebhookError};
use crate::domain::foundation::GatewayId;

/// Notes key the checkout flow stores the purchase id under.
pub const PURCHASE_ID_NOTES_KEY: &str = "purchase_id";

/// Razorpay webhook envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RazorpayEvent {
    /// Event name (e.g., "payment.captured").
    pub event: String,

    #[serde(default)]
    pub account_id: Option<String>,

    #[serde(default)]
    pub payload: RazorpayPayload,

    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RazorpayPayload {
    pub payment: Option<Wrapped<RazorpayPayment>>,
    pub subscription: Option<Wrapped<RazorpaySubscription>>,
    pub order: Option<Wrapped<RazorpayOrder>>,
}

/// Razorpay nests every entity under an `entity` key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Wrapped<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RazorpayPayment {
    pub id: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub order_id: Option<String>,
    pub invoice_id: Option<String>,
    pub customer_id: Option<String>,
    pub token_id: Option<String>,
    pub error_description: Option<String>,
    /// An object, or an empty array when there are no notes.
    #[serde(default)]
    pub notes: JsonValue,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RazorpaySubscription {
    pub id: String,
    pub status: Option<String>,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub paid_count: i64,
    #[serde(default)]
    pub notes: JsonValue,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount_paid: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub notes: JsonValue,
}

/// Reads the purchase id out of a Razorpay `notes` value.
pub fn purchase_ref_from_notes(notes: &JsonValue) -> Option<String> {
    notes
        .get(PURCHASE_ID_NOTES_KEY)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Delivery id used when the `X-Razorpay-Event-Id` header is absent.
pub fn fallback_event_id(payload: &[u8]) -> String {
    format!("body_{}", hex::encode(Sha256::digest(payload)))
}

impl RazorpayEvent {
    /// Parses a raw (already verified) payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    fn payment(&self) -> Option<&RazorpayPayment> {
        self.payload.payment.as_ref().map(|w| &w.entity)
    }

    fn subscription(&self) -> Option<&RazorpaySubscription> {
        self.payload.subscription.as_ref().map(|w| &w.entity)
    }

    fn order(&self) -> Option<&RazorpayOrder> {
        self.payload.order.as_ref().map(|w| &w.entity)
    }

    fn kind(&self) -> GatewayEventKind {
        match self.event.as_str() {
            "payment.captured" | "order.paid" => GatewayEventKind::PaymentSucceeded,
            "payment.failed" => GatewayEventKind::PaymentFailed,
            "subscription.charged" => {
                if self.subscription().map_or(0, |s| s.paid_count) > 1 {
                    GatewayEventKind::RenewalCharged
                } else {
                    GatewayEventKind::PaymentSucceeded
                }
            }
            "subscription.halted" | "subscription.pending" => GatewayEventKind::RenewalFailed,
            "subscription.cancelled" => GatewayEventKind::SubscriptionCancelled,
            "subscription.completed" | "subscription.expired" => {
                GatewayEventKind::SubscriptionExpired
            }
            _ => GatewayEventKind::Unhandled,
        }
    }

    /// Translates this event into the provider-neutral form.
    pub fn into_gateway_event(self, event_id: impl Into<String>) -> GatewayEvent {
        let kind = self.kind();
        let payment = self.payment();
        let subscription = self.subscription();
        let order = self.order();

        let mut event = GatewayEvent::new(GatewayId::razorpay(), event_id, &self.event, kind);

        event.purchase_ref = payment
            .and_then(|p| purchase_ref_from_notes(&p.notes))
            .or_else(|| subscription.and_then(|s| purchase_ref_from_notes(&s.notes)))
            .or_else(|| order.and_then(|o| purchase_ref_from_notes(&o.notes)));

        // Only point at the order when it was not delivered inline.
        if order.is_none() {
            event.related_object_id = payment.and_then(|p| p.order_id.clone());
        }

        event.payment.transaction_ref = payment.map(|p| p.id.clone()).or_else(|| {
            subscription.map(|s| format!("{}:{}", s.id, s.paid_count))
        });
        event.payment.gateway_subscription_id = subscription.map(|s| s.id.clone());
        event.payment.gateway_customer_id = payment
            .and_then(|p| p.customer_id.clone())
            .or_else(|| subscription.and_then(|s| s.customer_id.clone()));
        event.payment.gateway_payment_method_id = payment.and_then(|p| p.token_id.clone());
        event.payment.amount_cents = payment
            .and_then(|p| p.amount)
            .or_else(|| order.and_then(|o| o.amount_paid));
        event.payment.currency = payment
            .and_then(|p| p.currency.clone())
            .or_else(|| order.and_then(|o| o.currency.clone()))
            .map(|c| c.to_uppercase());

        if matches!(
            kind,
            GatewayEventKind::PaymentFailed | GatewayEventKind::RenewalFailed
        ) {
            event.failure_reason = Some(
                payment
                    .and_then(|p| p.error_description.clone())
                    .unwrap_or_else(|| self.event.clone()),
            );
        }

        event
    }
}
