//! Fixed in-memory plan catalog.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::foundation::{DomainError, FeatureKey, PlanId};
use crate::domain::purchase::{Feature, Plan};
use crate::ports::PlanCatalog;

/// Catalog assembled up front; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanCatalog {
    features: HashMap<FeatureKey, Feature>,
    plans: HashMap<PlanId, Plan>,
}

impl InMemoryPlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.insert(feature.key.clone(), feature);
        self
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans.insert(plan.id.clone(), plan);
        self
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn find_plan(&self, plan_id: &PlanId) -> Result<Option<Plan>, DomainError> {
        Ok(self.plans.get(plan_id).cloned())
    }

    async fn find_feature(&self, key: &FeatureKey) -> Result<Option<Feature>, DomainError> {
        Ok(self.features.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::purchase::CredentialKind;

    #[tokio::test]
    async fn finds_registered_entries_only() {
        let key = FeatureKey::new("geo-api").unwrap();
        let catalog = InMemoryPlanCatalog::new()
            .with_feature(Feature::new(key.clone(), "Geo API", CredentialKind::ApiKey))
            .with_plan(
                Plan::one_time(PlanId::new("lifetime").unwrap(), key.clone(), "Lifetime", 100, "USD")
                    .unwrap(),
            );

        assert!(catalog.find_feature(&key).await.unwrap().is_some());
        assert!(catalog
            .find_plan(&PlanId::new("lifetime").unwrap())
            .await
            .unwrap()
            .is_some());
        assert!(catalog
            .find_plan(&PlanId::new("monthly").unwrap())
            .await
            .unwrap()
            .is_none());
    }
}
