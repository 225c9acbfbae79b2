//! Notifications delivered as structured log lines.
//!
//! The default transport when no message bus is configured: downstream
//! consumers (mailers, provisioning) tail the `entitlement_events` target.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::EventPublisher;

pub const EVENT_LOG_TARGET: &str = "entitlement_events";

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        tracing::info!(
            target: EVENT_LOG_TARGET,
            event_id = %event.event_id,
            event_type = %event.event_type,
            schema_version = event.schema_version,
            purchase_id = %event.aggregate_id,
            user_id = %event.user_id,
            payload = %event.payload,
            "notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publishing_never_fails() {
        let publisher = TracingEventPublisher::new();
        let envelope =
            EventEnvelope::new("purchase.activated.v1", "p-1", "user-1", json!({"a": 1}));

        assert!(publisher.publish(envelope).await.is_ok());
    }
}
