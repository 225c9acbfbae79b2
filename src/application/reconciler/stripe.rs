//! Stripe reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{DomainError, GatewayId, Timestamp};
use crate::domain::gateway::stripe::StripeEvent;
use crate::domain::gateway::{verify_stripe_signature, GatewayEvent, WebhookError, WebhookRequest};
use crate::ports::GatewayClient;

use super::GatewayReconciler;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub struct StripeReconciler {
    webhook_secret: SecretString,
    /// Invoice lookups; absent when no API key is configured.
    client: Option<Arc<dyn GatewayClient>>,
}

impl StripeReconciler {
    pub fn new(webhook_secret: SecretString) -> Self {
        Self {
            webhook_secret,
            client: None,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn GatewayClient>) -> Self {
        self.client = Some(client);
        self
    }
}

#[async_trait]
impl GatewayReconciler for StripeReconciler {
    fn gateway(&self) -> GatewayId {
        GatewayId::stripe()
    }

    fn verify_and_parse(&self, request: &WebhookRequest) -> Result<GatewayEvent, WebhookError> {
        let signature = request
            .header(SIGNATURE_HEADER)
            .ok_or(WebhookError::MissingHeader(SIGNATURE_HEADER))?;
        verify_stripe_signature(
            self.webhook_secret.expose_secret().as_bytes(),
            &request.body,
            signature,
            Timestamp::now().as_unix_secs(),
        )?;
        Ok(StripeEvent::from_slice(&request.body)?.into_gateway_event())
    }

    async fn related_purchase_ref(
        &self,
        event: &GatewayEvent,
    ) -> Result<Option<String>, DomainError> {
        match (&self.client, &event.related_object_id) {
            (Some(client), Some(invoice_id)) => client.related_purchase_ref(invoice_id).await,
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::{sign_stripe_payload, GatewayEventKind};

    const SECRET: &str = "whsec_test";

    fn reconciler() -> StripeReconciler {
        StripeReconciler::new(SecretString::new(SECRET.to_string()))
    }

    fn body() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": {
                "id": "cs_1",
                "object": "checkout.session",
                "metadata": { "purchase_id": "abc" },
                "payment_intent": "pi_1"
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_correctly_signed_delivery() {
        let body = body();
        let header =
            sign_stripe_payload(SECRET.as_bytes(), Timestamp::now().as_unix_secs(), &body).unwrap();
        let request = WebhookRequest::new(body).with_header(SIGNATURE_HEADER, header);

        let event = reconciler().verify_and_parse(&request).unwrap();

        assert_eq!(event.kind, GatewayEventKind::PaymentSucceeded);
        assert_eq!(event.purchase_ref.as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_missing_header() {
        let request = WebhookRequest::new(body());

        let err = reconciler().verify_and_parse(&request).unwrap_err();
        assert!(matches!(err, WebhookError::MissingHeader(_)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = body();
        let header =
            sign_stripe_payload(b"whsec_other", Timestamp::now().as_unix_secs(), &body).unwrap();
        let request = WebhookRequest::new(body).with_header(SIGNATURE_HEADER, header);

        let err = reconciler().verify_and_parse(&request).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }

    #[tokio::test]
    async fn no_client_means_no_related_lookup() {
        let mut event = GatewayEvent::new(
            GatewayId::stripe(),
            "evt_2",
            "invoice.paid",
            GatewayEventKind::PaymentSucceeded,
        );
        event.related_object_id = Some("in_1".to_string());

        assert_eq!(reconciler().related_purchase_ref(&event).await.unwrap(), None);
    }
}
