//! Provider reconcilers and the registry that routes deliveries to them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, GatewayId};
use crate::domain::gateway::{GatewayEvent, WebhookError, WebhookRequest};

/// Provider-specific half of reconciliation.
///
/// Implementations authenticate and translate a delivery; the shared
/// pipeline decides what it means for the lifecycle.
#[async_trait]
pub trait GatewayReconciler: Send + Sync {
    fn gateway(&self) -> GatewayId;

    /// Verifies the delivery's signature and parses it.
    ///
    /// # Errors
    ///
    /// Any `WebhookError`; the delivery is rejected without side effects.
    fn verify_and_parse(&self, request: &WebhookRequest) -> Result<GatewayEvent, WebhookError>;

    /// Fetches the object one hop away from the event and returns the
    /// purchase id in its metadata, if any.
    async fn related_purchase_ref(
        &self,
        event: &GatewayEvent,
    ) -> Result<Option<String>, DomainError>;
}

/// Reconcilers keyed by gateway id, assembled once at start-up.
#[derive(Default, Clone)]
pub struct ReconcilerRegistry {
    reconcilers: HashMap<GatewayId, Arc<dyn GatewayReconciler>>,
}

impl ReconcilerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reconciler, replacing any previous one for the same gateway.
    pub fn register(mut self, reconciler: Arc<dyn GatewayReconciler>) -> Self {
        self.reconcilers.insert(reconciler.gateway(), reconciler);
        self
    }

    /// Looks up the reconciler for a gateway name from a webhook path.
    pub fn get(&self, gateway: &str) -> Option<Arc<dyn GatewayReconciler>> {
        let key = GatewayId::new(gateway).ok()?;
        self.reconcilers.get(&key).cloned()
    }

    pub fn gateways(&self) -> Vec<GatewayId> {
        let mut ids: Vec<GatewayId> = self.reconcilers.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }
}
