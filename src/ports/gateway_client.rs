//! GatewayClient port - follow-up calls to a payment provider.
//!
//! Used when an event does not carry the purchase id itself but references
//! an object (invoice, order) whose metadata might.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, GatewayId};

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Gateway this client talks to.
    fn gateway(&self) -> GatewayId;

    /// Fetches `object_id` from the provider and returns the purchase id
    /// stored in its metadata, if any.
    ///
    /// # Errors
    ///
    /// `InternalError` if the provider could not be reached or answered
    /// with an error. Callers treat this as "not found" and move on.
    async fn related_purchase_ref(&self, object_id: &str) -> Result<Option<String>, DomainError>;
}
