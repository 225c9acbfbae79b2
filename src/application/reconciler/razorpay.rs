//! Razorpay reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{DomainError, GatewayId};
use crate::domain::gateway::razorpay::{fallback_event_id, RazorpayEvent};
use crate::domain::gateway::{
    verify_razorpay_signature, GatewayEvent, WebhookError, WebhookRequest,
};
use crate::ports::GatewayClient;

use super::GatewayReconciler;

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";
pub const EVENT_ID_HEADER: &str = "X-Razorpay-Event-Id";

pub struct RazorpayReconciler {
    webhook_secret: SecretString,
    /// Order lookups; absent when no API credentials are configured.
    client: Option<Arc<dyn GatewayClient>>,
}

impl RazorpayReconciler {
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
impl GatewayReconciler for RazorpayReconciler {
    fn gateway(&self) -> GatewayId {
        GatewayId::razorpay()
    }

    fn verify_and_parse(&self, request: &WebhookRequest) -> Result<GatewayEvent, WebhookError> {
        let signature = request
            .header(SIGNATURE_HEADER)
            .ok_or(WebhookError::MissingHeader(SIGNATURE_HEADER))?;
        verify_razorpay_signature(
            self.webhook_secret.expose_secret().as_bytes(),
            &request.body,
            signature,
        )?;

        let event_id = request
            .header(EVENT_ID_HEADER)
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_event_id(&request.body));
        Ok(RazorpayEvent::from_slice(&request.body)?.into_gateway_event(event_id))
    }

    async fn related_purchase_ref(
        &self,
        event: &GatewayEvent,
    ) -> Result<Option<String>, DomainError> {
        match (&self.client, &event.related_object_id) {
            (Some(client), Some(order_id)) => client.related_purchase_ref(order_id).await,
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::{sign_razorpay_payload, GatewayEventKind};

    const SECRET: &str = "rzp_webhook_secret";

    fn body() -> Vec<u8> {
        serde_json::json!({
            "event": "subscription.charged",
            "payload": { "subscription": { "entity": {
                "id": "sub_1", "paid_count": 3, "notes": []
            }}}
        })
        .to_string()
        .into_bytes()
    }

    fn signed(body: Vec<u8>) -> WebhookRequest {
        let signature = sign_razorpay_payload(SECRET.as_bytes(), &body).unwrap();
        WebhookRequest::new(body).with_header(SIGNATURE_HEADER, signature)
    }

    fn reconciler() -> RazorpayReconciler {
        RazorpayReconciler::new(SecretString::new(SECRET.to_string()))
    }

    #[test]
    fn uses_event_id_header_when_present() {
        let request = signed(body()).with_header(EVENT_ID_HEADER, "evt_rzp_9");

        let event = reconciler().verify_and_parse(&request).unwrap();

        assert_eq!(event.event_id, "evt_rzp_9");
        assert_eq!(event.kind, GatewayEventKind::RenewalCharged);
        assert_eq!(event.transaction_reference(), "sub_1:3");
    }

    #[test]
    fn falls_back_to_body_hash_for_event_id() {
        let body = body();
        let expected = fallback_event_id(&body);

        let event = reconciler().verify_and_parse(&signed(body)).unwrap();

        assert_eq!(event.event_id, expected);
    }

    #[test]
    fn rejects_tampered_body() {
        let mut request = signed(body());
        request.body.extend_from_slice(b" ");

        let err = reconciler().verify_and_parse(&request).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature));
    }
}
