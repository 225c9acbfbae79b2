//! PostgreSQL implementation of PurchaseRepository.
//!
//! Unique constraints live in the schema; violations are mapped back to
//! the matching `ErrorCode` by constraint name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, ErrorCode, FeatureKey, GatewayId, PlanId, PurchaseId, Timestamp, UserId,
};
use crate::domain::purchase::{CredentialKind, Plan, Purchase, PurchaseStatus, TransactionType};
use crate::ports::PurchaseRepository;

const SELECT_COLUMNS: &str = r#"
    id, user_id, plan_id, feature_key, plan_snapshot, api_key, license_key,
    status, transaction_type, purchase_date, activation_date, expiry_date,
    cancellation_effective_date, failure_timestamp, failure_reason,
    gateway_id, transaction_id, gateway_subscription_id, gateway_customer_id,
    gateway_payment_method_id, requests_per_day, requests_per_month,
    parent_purchase_id, pending_switch_plan_id, auto_renew, amount_paid,
    currency, client_ip, updated_at
"#;

/// PostgreSQL implementation of the PurchaseRepository port.
pub struct PostgresPurchaseRepository {
    pool: PgPool,
}

impl PostgresPurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(
        &self,
        sql: &str,
        binds: &[&str],
    ) -> Result<Option<Purchase>, DomainError> {
        let mut query = sqlx::query_as::<_, PurchaseRow>(sql);
        for value in binds {
            query = query.bind(*value);
        }
        query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("fetch purchase", e))?
            .map(Purchase::try_from)
            .transpose()
    }
}

/// Database row representation of a purchase.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    user_id: String,
    plan_id: String,
    feature_key: String,
    plan_snapshot: Json<Plan>,
    api_key: Option<String>,
    license_key: Option<String>,
    status: String,
    transaction_type: String,
    purchase_date: DateTime<Utc>,
    activation_date: Option<DateTime<Utc>>,
    expiry_date: Option<DateTime<Utc>>,
    cancellation_effective_date: Option<DateTime<Utc>>,
    failure_timestamp: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    gateway_id: String,
    transaction_id: Option<String>,
    gateway_subscription_id: Option<String>,
    gateway_customer_id: Option<String>,
    gateway_payment_method_id: Option<String>,
    requests_per_day: Option<i64>,
    requests_per_month: Option<i64>,
    parent_purchase_id: Option<Uuid>,
    pending_switch_plan_id: Option<String>,
    auto_renew: bool,
    amount_paid: Option<i64>,
    currency: Option<String>,
    client_ip: Option<String>,
    updated_at: DateTime<Utc>,
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value: {}", column, err),
    )
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = DomainError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let status: PurchaseStatus = row.status.parse().map_err(|e| corrupt("status", e))?;
        let transaction_type: TransactionType = row
            .transaction_type
            .parse()
            .map_err(|e| corrupt("transaction_type", e))?;

        Ok(Purchase {
            id: PurchaseId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e))?,
            plan_id: PlanId::new(row.plan_id).map_err(|e| corrupt("plan_id", e))?,
            feature_key: FeatureKey::new(row.feature_key).map_err(|e| corrupt("feature_key", e))?,
            plan_snapshot: row.plan_snapshot.0,
            api_key: row.api_key,
            license_key: row.license_key,
            status,
            transaction_type,
            purchase_date: Timestamp::from_datetime(row.purchase_date),
            activation_date: row.activation_date.map(Timestamp::from_datetime),
            expiry_date: row.expiry_date.map(Timestamp::from_datetime),
            cancellation_effective_date: row
                .cancellation_effective_date
                .map(Timestamp::from_datetime),
            failure_timestamp: row.failure_timestamp.map(Timestamp::from_datetime),
            failure_reason: row.failure_reason,
            gateway_id: GatewayId::new(row.gateway_id).map_err(|e| corrupt("gateway_id", e))?,
            transaction_id: row.transaction_id,
            gateway_subscription_id: row.gateway_subscription_id,
            gateway_customer_id: row.gateway_customer_id,
            gateway_payment_method_id: row.gateway_payment_method_id,
            requests_per_day: row.requests_per_day,
            requests_per_month: row.requests_per_month,
            parent_purchase_id: row.parent_purchase_id.map(PurchaseId::from_uuid),
            pending_switch_plan_id: row
                .pending_switch_plan_id
                .map(PlanId::new)
                .transpose()
                .map_err(|e| corrupt("pending_switch_plan_id", e))?,
            auto_renew: row.auto_renew,
            amount_paid: row.amount_paid,
            currency: row.currency,
            client_ip: row.client_ip,
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn datetime(ts: Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.map(|t| *t.as_datetime())
}

/// Maps constraint violations to domain error codes.
fn map_write_error(context: &str, purchase: &Purchase, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        match db_err.constraint() {
            Some("purchases_one_active_per_feature") => {
                return DomainError::new(
                    ErrorCode::ActiveEntitlementExists,
                    "An active entitlement already exists for this user and feature",
                )
                .with_detail("user_id", purchase.user_id.to_string())
                .with_detail("feature_key", purchase.feature_key.to_string());
            }
            Some("purchases_api_key_key") | Some("purchases_license_key_key") => {
                return DomainError::new(
                    ErrorCode::CredentialConflict,
                    "Credential is already assigned to another purchase",
                )
                .with_detail("purchase_id", purchase.id.to_string());
            }
            Some("purchases_renewal_transaction_key") => {
                return DomainError::new(
                    ErrorCode::DuplicateTransaction,
                    "Transaction already recorded",
                )
                .with_detail(
                    "transaction_id",
                    purchase.transaction_id.clone().unwrap_or_default(),
                );
            }
            _ => {}
        }
    }
    DomainError::database(context, e)
}

async fn write_update<'e, E: PgExecutor<'e>>(
    executor: E,
    purchase: &Purchase,
) -> Result<(), DomainError> {
    let result = sqlx::query(
        r#"
        UPDATE purchases SET
            plan_id = $2,
            feature_key = $3,
            plan_snapshot = $4,
            api_key = $5,
            license_key = $6,
            status = $7,
            transaction_type = $8,
            activation_date = $9,
            expiry_date = $10,
            cancellation_effective_date = $11,
            failure_timestamp = $12,
            failure_reason = $13,
            transaction_id = $14,
            gateway_subscription_id = $15,
            gateway_customer_id = $16,
            gateway_payment_method_id = $17,
            requests_per_day = $18,
            requests_per_month = $19,
            pending_switch_plan_id = $20,
            auto_renew = $21,
            amount_paid = $22,
            currency = $23,
            updated_at = $24
        WHERE id = $1
        "#,
    )
    .bind(purchase.id.as_uuid())
    .bind(purchase.plan_id.as_str())
    .bind(purchase.feature_key.as_str())
    .bind(Json(&purchase.plan_snapshot))
    .bind(&purchase.api_key)
    .bind(&purchase.license_key)
    .bind(purchase.status.as_str())
    .bind(purchase.transaction_type.as_str())
    .bind(datetime(purchase.activation_date))
    .bind(datetime(purchase.expiry_date))
    .bind(datetime(purchase.cancellation_effective_date))
    .bind(datetime(purchase.failure_timestamp))
    .bind(&purchase.failure_reason)
    .bind(&purchase.transaction_id)
    .bind(&purchase.gateway_subscription_id)
    .bind(&purchase.gateway_customer_id)
    .bind(&purchase.gateway_payment_method_id)
    .bind(purchase.requests_per_day)
    .bind(purchase.requests_per_month)
    .bind(purchase.pending_switch_plan_id.as_ref().map(|p| p.as_str()))
    .bind(purchase.auto_renew)
    .bind(purchase.amount_paid)
    .bind(&purchase.currency)
    .bind(purchase.updated_at.as_datetime())
    .execute(executor)
    .await
    .map_err(|e| map_write_error("update purchase", purchase, e))?;

    if result.rows_affected() == 0 {
        return Err(
            DomainError::new(ErrorCode::PurchaseNotFound, "Purchase not found")
                .with_detail("purchase_id", purchase.id.to_string()),
        );
    }
    Ok(())
}

#[async_trait]
impl PurchaseRepository for PostgresPurchaseRepository {
    async fn insert(&self, purchase: &Purchase) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, user_id, plan_id, feature_key, plan_snapshot, api_key, license_key,
                status, transaction_type, purchase_date, activation_date, expiry_date,
                cancellation_effective_date, failure_timestamp, failure_reason,
                gateway_id, transaction_id, gateway_subscription_id, gateway_customer_id,
                gateway_payment_method_id, requests_per_day, requests_per_month,
                parent_purchase_id, pending_switch_plan_id, auto_renew, amount_paid,
                currency, client_ip, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29
            )
            "#,
        )
        .bind(purchase.id.as_uuid())
        .bind(purchase.user_id.as_str())
        .bind(purchase.plan_id.as_str())
        .bind(purchase.feature_key.as_str())
        .bind(Json(&purchase.plan_snapshot))
        .bind(&purchase.api_key)
        .bind(&purchase.license_key)
        .bind(purchase.status.as_str())
        .bind(purchase.transaction_type.as_str())
        .bind(purchase.purchase_date.as_datetime())
        .bind(datetime(purchase.activation_date))
        .bind(datetime(purchase.expiry_date))
        .bind(datetime(purchase.cancellation_effective_date))
        .bind(datetime(purchase.failure_timestamp))
        .bind(&purchase.failure_reason)
        .bind(purchase.gateway_id.as_str())
        .bind(&purchase.transaction_id)
        .bind(&purchase.gateway_subscription_id)
        .bind(&purchase.gateway_customer_id)
        .bind(&purchase.gateway_payment_method_id)
        .bind(purchase.requests_per_day)
        .bind(purchase.requests_per_month)
        .bind(purchase.parent_purchase_id.map(|id| *id.as_uuid()))
        .bind(purchase.pending_switch_plan_id.as_ref().map(|p| p.as_str()))
        .bind(purchase.auto_renew)
        .bind(purchase.amount_paid)
        .bind(&purchase.currency)
        .bind(&purchase.client_ip)
        .bind(purchase.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error("insert purchase", purchase, e))?;

        Ok(())
    }

    async fn update(&self, purchase: &Purchase) -> Result<(), DomainError> {
        write_update(&self.pool, purchase).await
    }

    async fn supersede(&self, parent: &Purchase, successor: &Purchase) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("begin supersede", e))?;

        write_update(&mut *tx, parent).await?;
        write_update(&mut *tx, successor).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("commit supersede", e))
    }

    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError> {
        sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("find purchase", e))?
        .map(Purchase::try_from)
        .transpose()
    }

    async fn find_active(
        &self,
        user_id: &UserId,
        feature_key: &FeatureKey,
    ) -> Result<Option<Purchase>, DomainError> {
        self.fetch_optional(
            &format!(
                "SELECT {} FROM purchases \
                 WHERE user_id = $1 AND feature_key = $2 AND status = 'active'",
                SELECT_COLUMNS
            ),
            &[user_id.as_str(), feature_key.as_str()],
        )
        .await
    }

    async fn find_by_credential(&self, value: &str) -> Result<Option<Purchase>, DomainError> {
        self.fetch_optional(
            &format!(
                "SELECT {} FROM purchases WHERE api_key = $1 OR license_key = $1 LIMIT 1",
                SELECT_COLUMNS
            ),
            &[value],
        )
        .await
    }

    async fn credential_in_use(
        &self,
        kind: CredentialKind,
        value: &str,
        excluding: Option<&PurchaseId>,
    ) -> Result<bool, DomainError> {
        let sql = match kind {
            CredentialKind::LicenseKey => {
                "SELECT EXISTS (SELECT 1 FROM purchases \
                 WHERE license_key = $1 AND ($2::uuid IS NULL OR id <> $2))"
            }
            CredentialKind::ApiKey | CredentialKind::None => {
                "SELECT EXISTS (SELECT 1 FROM purchases \
                 WHERE api_key = $1 AND ($2::uuid IS NULL OR id <> $2))"
            }
        };
        sqlx::query_scalar::<_, bool>(sql)
            .bind(value)
            .bind(excluding.map(|id| *id.as_uuid()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("check credential", e))
    }

    async fn find_latest_by_subscription(
        &self,
        gateway_id: &GatewayId,
        subscription_id: &str,
    ) -> Result<Option<Purchase>, DomainError> {
        self.fetch_optional(
            &format!(
                "SELECT {} FROM purchases \
                 WHERE gateway_id = $1 AND gateway_subscription_id = $2 \
                 ORDER BY seq DESC LIMIT 1",
                SELECT_COLUMNS
            ),
            &[gateway_id.as_str(), subscription_id],
        )
        .await
    }

    async fn find_latest_by_transaction(
        &self,
        gateway_id: &GatewayId,
        transaction_id: &str,
        transaction_type: Option<TransactionType>,
    ) -> Result<Option<Purchase>, DomainError> {
        match transaction_type {
            Some(transaction_type) => {
                self.fetch_optional(
                    &format!(
                        "SELECT {} FROM purchases \
                         WHERE gateway_id = $1 AND transaction_id = $2 AND transaction_type = $3 \
                         ORDER BY seq DESC LIMIT 1",
                        SELECT_COLUMNS
                    ),
                    &[gateway_id.as_str(), transaction_id, transaction_type.as_str()],
                )
                .await
            }
            None => {
                self.fetch_optional(
                    &format!(
                        "SELECT {} FROM purchases \
                         WHERE gateway_id = $1 AND transaction_id = $2 \
                         ORDER BY seq DESC LIMIT 1",
                        SELECT_COLUMNS
                    ),
                    &[gateway_id.as_str(), transaction_id],
                )
                .await
            }
        }
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError> {
        sqlx::query_as::<_, PurchaseRow>(&format!(
            "SELECT {} FROM purchases WHERE user_id = $1 ORDER BY seq DESC",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("list purchases", e))?
        .into_iter()
        .map(Purchase::try_from)
        .collect()
    }
}
