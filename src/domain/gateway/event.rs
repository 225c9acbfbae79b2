//! Provider-neutral view of a verified webhook delivery.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::GatewayId;
use crate::domain::purchase::PaymentDetails;

/// Raw inbound delivery: lowercased header names and the exact body bytes.
///
/// The body must not be re-serialized before verification; signatures are
/// computed over the bytes as sent.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// What a delivery means for the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventKind {
    /// A first payment (checkout, one-off charge) succeeded.
    PaymentSucceeded,
    /// A first payment failed.
    PaymentFailed,
    /// A recurring charge on an existing subscription succeeded.
    RenewalCharged,
    /// A recurring charge on an existing subscription failed.
    RenewalFailed,
    SubscriptionCancelled,
    SubscriptionExpired,
    /// Recognized delivery we have nothing to do for.
    Unhandled,
}

/// A verified, parsed provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEvent {
    pub gateway: GatewayId,

    /// Provider's delivery id; the ledger key together with `gateway`.
    pub event_id: String,

    /// Provider's own event name (e.g. "invoice.payment_succeeded").
    pub event_type: String,

    pub kind: GatewayEventKind,

    /// Purchase id carried in the event's own metadata.
    pub purchase_ref: Option<String>,

    /// Object one hop away whose metadata may carry the purchase id
    /// (a Stripe invoice, a Razorpay order).
    pub related_object_id: Option<String>,

    pub payment: PaymentDetails,

    pub failure_reason: Option<String>,
}

impl GatewayEvent {
    pub fn new(
        gateway: GatewayId,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        kind: GatewayEventKind,
    ) -> Self {
        Self {
            gateway,
            event_id: event_id.into(),
            event_type: event_type.into(),
            kind,
            purchase_ref: None,
            related_object_id: None,
            payment: PaymentDetails::default(),
            failure_reason: None,
        }
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.payment.gateway_subscription_id.as_deref()
    }

    /// Provider reference for the charge; falls back to the delivery id so
    /// renewal deduplication always has a key.
    pub fn transaction_reference(&self) -> &str {
        self.payment
            .transaction_ref
            .as_deref()
            .unwrap_or(&self.event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = WebhookRequest::new(b"{}".to_vec()).with_header("Stripe-Signature", "t=1");
        assert_eq!(request.header("stripe-signature"), Some("t=1"));
        assert_eq!(request.header("STRIPE-SIGNATURE"), Some("t=1"));
        assert_eq!(request.header("x-other"), None);
    }

    #[test]
    fn transaction_reference_falls_back_to_event_id() {
        let mut event = GatewayEvent::new(
            GatewayId::stripe(),
            "evt_1",
            "invoice.paid",
            GatewayEventKind::RenewalCharged,
        );
        assert_eq!(event.transaction_reference(), "evt_1");

        event.payment.transaction_ref = Some("pi_1".to_string());
        assert_eq!(event.transaction_reference(), "pi_1");
    }
}
