//! Purchase Lifecycle Manager - sole writer of entitlement records.
//!
//! Every state change of a `Purchase` goes through `LifecycleManager`:
//! checkout flows call `initiate_purchase`, reconcilers and the manual
//! approver call `activate_purchase` / `record_purchase_failure`, and
//! cancellations go through `terminate_purchase`.
//!
//! # Module Structure
//!
//! - `initiate` - new records (pending, or direct active/failed outcomes)
//! - `activate` - idempotent confirmation and credential migration
//! - `failure` - idempotent failure recording
//! - `manual_switch` - request and approve operator-driven plan switches
//! - `terminate` - cancellation / expiry
//! - `queries` - read interface for entitlement checks

mod activate;
mod failure;
mod initiate;
mod manual_switch;
mod queries;
mod terminate;

use std::sync::Arc;

use crate::domain::foundation::{EventEnvelope, FeatureKey, PlanId, PurchaseId};
use crate::domain::purchase::{Feature, Plan, Purchase, PurchaseError};
use crate::ports::{EventPublisher, PlanCatalog, PurchaseRepository};

use super::credentials::CredentialManager;

pub use activate::{ActivatePurchaseCommand, ActivationResult};
pub use failure::{FailureResult, RecordFailureCommand};
pub use initiate::InitiatePurchaseCommand;
pub use terminate::{TerminatePurchaseCommand, TerminationResult};

/// Orchestrates every entitlement state transition.
pub struct LifecycleManager {
    purchases: Arc<dyn PurchaseRepository>,
    catalog: Arc<dyn PlanCatalog>,
    credentials: CredentialManager,
    event_publisher: Arc<dyn EventPublisher>,
}

impl LifecycleManager {
    pub fn new(
        purchases: Arc<dyn PurchaseRepository>,
        catalog: Arc<dyn PlanCatalog>,
        credentials: CredentialManager,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            purchases,
            catalog,
            credentials,
            event_publisher,
        }
    }

    async fn load(&self, id: &PurchaseId) -> Result<Purchase, PurchaseError> {
        self.purchases
            .find_by_id(id)
            .await?
            .ok_or_else(|| PurchaseError::NotFound(id.to_string()))
    }

    async fn resolve_plan(&self, plan_id: &PlanId) -> Result<(Plan, Feature), PurchaseError> {
        let plan = self
            .catalog
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| PurchaseError::InvalidPlan(format!("plan {} does not exist", plan_id)))?;
        let feature = self.resolve_feature(&plan.feature_key).await?;
        Ok((plan, feature))
    }

    async fn resolve_feature(&self, key: &FeatureKey) -> Result<Feature, PurchaseError> {
        self.catalog.find_feature(key).await?.ok_or_else(|| {
            PurchaseError::InvalidPlan(format!("feature {} does not exist", key))
        })
    }

    /// Publishes a notification. The write it describes is already stored,
    /// so a transport failure is logged and swallowed.
    async fn notify(&self, envelope: EventEnvelope) {
        let event_type = envelope.event_type.clone();
        let aggregate_id = envelope.aggregate_id.clone();
        if let Err(err) = self.event_publisher.publish(envelope).await {
            tracing::warn!(
                event_type = %event_type,
                purchase_id = %aggregate_id,
                error = %err,
                "failed to publish notification"
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::{InMemoryPlanCatalog, InMemoryPurchaseRepository};
    use crate::domain::foundation::UserId;
    use crate::domain::purchase::CredentialKind;

    pub struct Harness {
        pub manager: LifecycleManager,
        pub purchases: Arc<InMemoryPurchaseRepository>,
        pub events: Arc<InMemoryEventBus>,
    }

    pub fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    pub fn harness() -> Harness {
        let purchases = Arc::new(InMemoryPurchaseRepository::new());
        let events = Arc::new(InMemoryEventBus::new());
        let catalog = InMemoryPlanCatalog::new()
            .with_feature(Feature::new(
                FeatureKey::new("geo-api").unwrap(),
                "Geo API",
                CredentialKind::ApiKey,
            ))
            .with_feature(Feature::new(
                FeatureKey::new("reports").unwrap(),
                "Reports",
                CredentialKind::None,
            ))
            .with_plan(
                Plan::recurring(
                    PlanId::new("basic").unwrap(),
                    FeatureKey::new("geo-api").unwrap(),
                    "Basic",
                    900,
                    "USD",
                    30,
                )
                .unwrap(),
            )
            .with_plan(
                Plan::recurring(
                    PlanId::new("pro").unwrap(),
                    FeatureKey::new("geo-api").unwrap(),
                    "Pro",
                    2900,
                    "USD",
                    30,
                )
                .unwrap()
                .with_limits(Some(10_000), None),
            )
            .with_plan(
                Plan::one_time(
                    PlanId::new("reports-lifetime").unwrap(),
                    FeatureKey::new("reports").unwrap(),
                    "Reports Lifetime",
                    4900,
                    "USD",
                )
                .unwrap(),
            );
        let manager = LifecycleManager::new(
            purchases.clone(),
            Arc::new(catalog),
            CredentialManager::new(purchases.clone(), 10),
            events.clone(),
        );
        Harness {
            manager,
            purchases,
            events,
        }
    }
}
