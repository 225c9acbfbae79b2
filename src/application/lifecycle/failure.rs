//! record_purchase_failure - idempotent failure recording.

use crate::domain::foundation::{PurchaseId, SerializableDomainEvent, Timestamp};
use crate::domain::purchase::{Purchase, PurchaseError, PurchaseFailed, PurchaseStatus};

use super::LifecycleManager;

/// Command to mark a pending record failed.
#[derive(Debug, Clone)]
pub struct RecordFailureCommand {
    pub purchase_id: PurchaseId,
    pub reason: String,
    /// Gateway reference of the failed charge, stored if none is set yet.
    pub transaction_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureResult {
    Recorded(Purchase),
    /// The record was already failed; nothing changed.
    AlreadyFailed(Purchase),
}

impl FailureResult {
    pub fn purchase(&self) -> &Purchase {
        match self {
            FailureResult::Recorded(p) | FailureResult::AlreadyFailed(p) => p,
        }
    }
}

impl LifecycleManager {
    /// Marks a pending record failed.
    ///
    /// An active record is never flipped to failed; a failed renewal gets
    /// its own failed record instead.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record doesn't exist
    /// - `NotPendingPayment` if the record is active or terminal (other than failed)
    pub async fn record_purchase_failure(
        &self,
        cmd: RecordFailureCommand,
    ) -> Result<FailureResult, PurchaseError> {
        let mut record = self.load(&cmd.purchase_id).await?;

        match record.status {
            PurchaseStatus::Failed => {
                tracing::debug!(purchase_id = %record.id, "failure already recorded");
                Ok(FailureResult::AlreadyFailed(record))
            }
            PurchaseStatus::PendingPayment => {
                record.fail(cmd.reason, cmd.transaction_ref.as_deref(), Timestamp::now())?;
                self.purchases.update(&record).await?;
                tracing::info!(
                    purchase_id = %record.id,
                    user_id = %record.user_id,
                    reason = record.failure_reason.as_deref().unwrap_or_default(),
                    "purchase failed"
                );
                self.notify(PurchaseFailed::from_record(&record).to_envelope())
                    .await;
                Ok(FailureResult::Recorded(record))
            }
            status => Err(PurchaseError::not_pending(record.id, status)),
        }
    }
}
