//! EventPublisher port - Interface for publishing entitlement notifications.
//!
//! The lifecycle manager publishes without knowing the transport
//! (structured logs, in-memory capture, a message bus).

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Publishing happens after the corresponding write is stored. A publish
/// failure never undoes that write.
///
/// # Example
///
/// ```ignore
/// let envelope = PurchaseActivated::from_record(&record).to_envelope();
/// publisher.publish(envelope).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish several events in order.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}
