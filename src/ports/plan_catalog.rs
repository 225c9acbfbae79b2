//! PlanCatalog port - read access to features and their priced plans.
//!
//! Plans are administered elsewhere; the engine only reads them.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, FeatureKey, PlanId};
use crate::domain::purchase::{Feature, Plan};

#[async_trait]
pub trait PlanCatalog: Send + Sync {
    async fn find_plan(&self, plan_id: &PlanId) -> Result<Option<Plan>, DomainError>;

    async fn find_feature(&self, key: &FeatureKey) -> Result<Option<Feature>, DomainError>;
}
