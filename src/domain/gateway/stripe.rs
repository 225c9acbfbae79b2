//! Stripe webhook event types.
//!
//! Only fields relevant to reconciliation are captured. Every object kind we
//! care about (checkout session, payment intent, invoice, subscription) is
//! read through one permissive struct because the events differ only in
//! which of these fields are populated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{GatewayEvent, GatewayEventKind, WebhookError};
use crate::domain::foundation::GatewayId;

/// Metadata key the checkout flow stores the purchase id under.
pub const PURCHASE_ID_METADATA_KEY: &str = "purchase_id";

/// Stripe webhook event (simplified).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    #[serde(default)]
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: StripeObject,
}

/// A reference that Stripe may send either as an id or as the expanded object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeMetadataHolder {
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentError {
    pub message: Option<String>,
    pub code: Option<String>,
}

/// Union of the object fields used across the handled event types.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeObject {
    pub id: String,

    /// Object kind ("checkout.session", "invoice", ...).
    #[serde(default)]
    pub object: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    pub customer: Option<Expandable>,
    pub subscription: Option<Expandable>,
    pub payment_intent: Option<Expandable>,
    pub payment_method: Option<Expandable>,
    pub invoice: Option<Expandable>,

    pub amount: Option<i64>,
    pub amount_received: Option<i64>,
    pub amount_total: Option<i64>,
    pub amount_paid: Option<i64>,
    pub currency: Option<String>,

    /// Invoices: "subscription_create", "subscription_cycle", ...
    pub billing_reason: Option<String>,

    /// Subscriptions and sessions: lifecycle status string.
    pub status: Option<String>,

    pub attempt_count: Option<i64>,

    /// Invoices copy subscription metadata here.
    pub subscription_details: Option<StripeMetadataHolder>,

    pub last_payment_error: Option<StripePaymentError>,
}

impl StripeObject {
    /// Purchase id from this object's own metadata, or from the subscription
    /// metadata Stripe copies onto invoices.
    pub fn purchase_ref(&self) -> Option<String> {
        self.metadata
            .get(PURCHASE_ID_METADATA_KEY)
            .or_else(|| {
                self.subscription_details
                    .as_ref()
                    .and_then(|d| d.metadata.get(PURCHASE_ID_METADATA_KEY))
            })
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn amount_cents(&self) -> Option<i64> {
        self.amount_received
            .or(self.amount_paid)
            .or(self.amount_total)
            .or(self.amount)
    }

    fn is_subscription_cycle(&self) -> bool {
        self.billing_reason.as_deref() == Some("subscription_cycle")
    }
}

/// Known Stripe event types that we handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    CheckoutSessionCompleted,
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    InvoicePaid,
    InvoicePaymentFailed,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    Unknown,
}

impl StripeEventType {
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentFailed,
            "invoice.payment_succeeded" | "invoice.paid" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            _ => Self::Unknown,
        }
    }
}

impl StripeEvent {
    /// Parses a raw (already verified) payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::parse(&self.event_type)
    }

    fn kind(&self) -> GatewayEventKind {
        let object = &self.data.object;
        match self.parsed_type() {
            StripeEventType::CheckoutSessionCompleted
            | StripeEventType::PaymentIntentSucceeded => GatewayEventKind::PaymentSucceeded,
            StripeEventType::InvoicePaid if object.is_subscription_cycle() => {
                GatewayEventKind::RenewalCharged
            }
            StripeEventType::InvoicePaid => GatewayEventKind::PaymentSucceeded,
            StripeEventType::InvoicePaymentFailed if object.is_subscription_cycle() => {
                GatewayEventKind::RenewalFailed
            }
            StripeEventType::InvoicePaymentFailed | StripeEventType::PaymentIntentFailed => {
                GatewayEventKind::PaymentFailed
            }
            StripeEventType::CustomerSubscriptionDeleted => GatewayEventKind::SubscriptionCancelled,
            StripeEventType::CustomerSubscriptionUpdated
                if object.status.as_deref() == Some("incomplete_expired") =>
            {
                GatewayEventKind::SubscriptionExpired
            }
            StripeEventType::CustomerSubscriptionUpdated | StripeEventType::Unknown => {
                GatewayEventKind::Unhandled
            }
        }
    }

    /// Translates this event into the provider-neutral form.
    pub fn into_gateway_event(self) -> GatewayEvent {
        let kind = self.kind();
        let object = &self.data.object;
        let is_subscription_object = object.object == "subscription";
        let is_invoice = object.object == "invoice";

        let mut event = GatewayEvent::new(GatewayId::stripe(), &self.id, &self.event_type, kind);
        event.purchase_ref = object.purchase_ref();

        // The invoice itself is the related object for invoice events, so only
        // sessions and payment intents point one hop away.
        if !is_invoice {
            event.related_object_id = object.invoice.as_ref().map(|i| i.id().to_string());
        }

        event.payment.transaction_ref = Some(
            object
                .payment_intent
                .as_ref()
                .map(|pi| pi.id().to_string())
                .unwrap_or_else(|| object.id.clone()),
        );
        event.payment.gateway_subscription_id = if is_subscription_object {
            Some(object.id.clone())
        } else {
            object.subscription.as_ref().map(|s| s.id().to_string())
        };
        event.payment.gateway_customer_id = object.customer.as_ref().map(|c| c.id().to_string());
        event.payment.gateway_payment_method_id =
            object.payment_method.as_ref().map(|m| m.id().to_string());
        event.payment.amount_cents = object.amount_cents();
        event.payment.currency = object.currency.as_ref().map(|c| c.to_uppercase());

        if matches!(
            kind,
            GatewayEventKind::PaymentFailed | GatewayEventKind::RenewalFailed
        ) {
            event.failure_reason = Some(
                object
                    .last_payment_error
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .unwrap_or_else(|| match object.attempt_count {
                        Some(n) => format!("{} (attempt {})", self.event_type, n),
                        None => self.event_type.clone(),
                    }),
            );
        }

        event
    }
}
