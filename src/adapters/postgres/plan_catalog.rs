//! PostgreSQL implementation of PlanCatalog.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, FeatureKey, PlanId};
use crate::domain::purchase::{BillingCycle, CredentialKind, Feature, Plan};
use crate::ports::PlanCatalog;

pub struct PostgresPlanCatalog {
    pool: PgPool,
}

impl PostgresPlanCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: String,
    feature_key: String,
    name: String,
    price_cents: i64,
    currency: String,
    billing_cycle: String,
    duration_days: Option<i64>,
    requests_per_day: Option<i64>,
    requests_per_month: Option<i64>,
    active: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct FeatureRow {
    key: String,
    name: String,
    credential_kind: String,
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value: {}", column, err),
    )
}

impl TryFrom<PlanRow> for Plan {
    type Error = DomainError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let billing_cycle: BillingCycle = row
            .billing_cycle
            .parse()
            .map_err(|e| corrupt("billing_cycle", e))?;

        let plan = Plan {
            id: PlanId::new(row.id).map_err(|e| corrupt("id", e))?,
            feature_key: FeatureKey::new(row.feature_key).map_err(|e| corrupt("feature_key", e))?,
            name: row.name,
            price_cents: row.price_cents,
            currency: row.currency,
            billing_cycle,
            duration_days: row.duration_days,
            requests_per_day: row.requests_per_day,
            requests_per_month: row.requests_per_month,
            active: row.active,
        };
        plan.validate().map_err(|e| corrupt("plan", e))?;
        Ok(plan)
    }
}

impl TryFrom<FeatureRow> for Feature {
    type Error = DomainError;

    fn try_from(row: FeatureRow) -> Result<Self, Self::Error> {
        let kind: CredentialKind = row
            .credential_kind
            .parse()
            .map_err(|e| corrupt("credential_kind", e))?;
        Ok(Feature::new(
            FeatureKey::new(row.key).map_err(|e| corrupt("key", e))?,
            row.name,
            kind,
        ))
    }
}

#[async_trait]
impl PlanCatalog for PostgresPlanCatalog {
    async fn find_plan(&self, plan_id: &PlanId) -> Result<Option<Plan>, DomainError> {
        sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, feature_key, name, price_cents, currency, billing_cycle,
                   duration_days, requests_per_day, requests_per_month, active
            FROM plans
            WHERE id = $1
            "#,
        )
        .bind(plan_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("find plan", e))?
        .map(Plan::try_from)
        .transpose()
    }

    async fn find_feature(&self, key: &FeatureKey) -> Result<Option<Feature>, DomainError> {
        sqlx::query_as::<_, FeatureRow>(
            "SELECT key, name, credential_kind FROM features WHERE key = $1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("find feature", e))?
        .map(Feature::try_from)
        .transpose()
    }
}
