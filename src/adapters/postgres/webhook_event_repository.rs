//! PostgreSQL webhook delivery ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, GatewayId, PurchaseId, Timestamp};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    gateway_id: String,
    event_id: String,
    event_type: String,
    outcome: String,
    detail: Option<String>,
    purchase_id: Option<Uuid>,
    received_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(WebhookEventRecord {
            gateway_id: GatewayId::new(row.gateway_id).map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid gateway_id value: {}", e),
                )
            })?,
            event_id: row.event_id,
            event_type: row.event_type,
            outcome: row.outcome,
            detail: row.detail,
            purchase_id: row.purchase_id.map(PurchaseId::from_uuid),
            received_at: Timestamp::from_datetime(row.received_at),
        })
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find(
        &self,
        gateway_id: &GatewayId,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        sqlx::query_as::<_, WebhookEventRow>(
            r#"
            SELECT gateway_id, event_id, event_type, outcome, detail, purchase_id, received_at
            FROM webhook_events
            WHERE gateway_id = $1 AND event_id = $2
            "#,
        )
        .bind(gateway_id.as_str())
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("find webhook event", e))?
        .map(WebhookEventRecord::try_from)
        .transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        // Only retryable outcomes may be overwritten by a later delivery.
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                gateway_id, event_id, event_type, outcome, detail, purchase_id, received_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (gateway_id, event_id) DO UPDATE SET
                event_type = EXCLUDED.event_type,
                outcome = EXCLUDED.outcome,
                detail = EXCLUDED.detail,
                purchase_id = EXCLUDED.purchase_id,
                received_at = EXCLUDED.received_at
            WHERE webhook_events.outcome IN ('unresolved', 'failed')
            "#,
        )
        .bind(record.gateway_id.as_str())
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(&record.outcome)
        .bind(&record.detail)
        .bind(record.purchase_id.map(|id| *id.as_uuid()))
        .bind(record.received_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("save webhook event", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyFinal)
        } else {
            Ok(SaveResult::Recorded)
        }
    }
}
