//! In-memory event bus for tests and local runs.
//!
//! Captures every published notification for assertions. Publishing can be
//! made to fail to exercise the "stored but not delivered" path.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// In-memory event bus.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// manager.activate_purchase(cmd).await?;
///
/// assert!(bus.has_event("purchase.activated.v1"));
/// ```
#[derive(Default)]
pub struct InMemoryEventBus {
    published: Mutex<Vec<EventEnvelope>>,
    failing: AtomicBool,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> MutexGuard<'_, Vec<EventEnvelope>> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Test Helpers ===

    /// Makes every following publish fail (or succeed again).
    pub fn fail_publishes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.events().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn events_for_aggregate(&self, aggregate_id: &str) -> Vec<EventEnvelope> {
        self.events()
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    /// Event types in publish order.
    pub fn event_types(&self) -> Vec<String> {
        self.events().iter().map(|e| e.event_type.clone()).collect()
    }

    pub fn event_count(&self) -> usize {
        self.events().len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.events().iter().any(|e| e.event_type == event_type)
    }

    pub fn clear(&self) {
        self.events().clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("event bus unavailable, dropped {}", event.event_type),
            ));
        }
        self.events().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_type: &str, aggregate_id: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, aggregate_id, "user-1", json!({}))
    }

    #[tokio::test]
    async fn captures_published_events_in_order() {
        let bus = InMemoryEventBus::new();

        bus.publish(envelope("purchase.initiated.v1", "p-1")).await.unwrap();
        bus.publish(envelope("purchase.activated.v1", "p-1")).await.unwrap();
        bus.publish(envelope("purchase.initiated.v1", "p-2")).await.unwrap();

        assert_eq!(bus.event_count(), 3);
        assert_eq!(bus.events_of_type("purchase.initiated.v1").len(), 2);
        assert_eq!(bus.events_for_aggregate("p-1").len(), 2);
        assert_eq!(bus.event_types()[1], "purchase.activated.v1");
    }

    #[tokio::test]
    async fn failing_bus_rejects_and_keeps_nothing() {
        let bus = InMemoryEventBus::new();
        bus.fail_publishes(true);

        let result = bus.publish(envelope("purchase.failed.v1", "p-1")).await;

        assert!(result.is_err());
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn publish_all_keeps_order() {
        let bus = InMemoryEventBus::new();

        bus.publish_all(vec![
            envelope("purchase.initiated.v1", "p-1"),
            envelope("purchase.failed.v1", "p-1"),
        ])
        .await
        .unwrap();

        assert_eq!(
            bus.event_types(),
            vec!["purchase.initiated.v1", "purchase.failed.v1"]
        );
        bus.clear();
        assert!(!bus.has_event("purchase.failed.v1"));
    }
}
