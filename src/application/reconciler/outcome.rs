//! What reconciling one delivery produced.

use crate::domain::foundation::PurchaseId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A pending record became active.
    Activated(PurchaseId),
    /// The record was already active (duplicate confirmation).
    AlreadyActive(PurchaseId),
    /// A renewal record was created and activated.
    Renewed { parent: PurchaseId, renewal: PurchaseId },
    /// The renewal reference was already recorded; nothing changed.
    DuplicateRenewal(PurchaseId),
    /// A failure was recorded (on the record, or as a new failed renewal).
    FailureRecorded(PurchaseId),
    /// The record was cancelled or expired.
    Terminated(PurchaseId),
    /// No record could be linked to the delivery.
    Unresolved,
    /// Acknowledged without action.
    Ignored(String),
    /// Processing hit an error; the delivery may be retried.
    Failed {
        purchase_id: Option<PurchaseId>,
        reason: String,
    },
    /// A final outcome for this delivery was already recorded.
    AlreadyProcessed,
}

impl ReconcileOutcome {
    /// Stable label stored in the delivery ledger.
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Activated(_) => "activated",
            ReconcileOutcome::AlreadyActive(_) => "already_active",
            ReconcileOutcome::Renewed { .. } => "renewed",
            ReconcileOutcome::DuplicateRenewal(_) => "duplicate_renewal",
            ReconcileOutcome::FailureRecorded(_) => "failure_recorded",
            ReconcileOutcome::Terminated(_) => "terminated",
            ReconcileOutcome::Unresolved => "unresolved",
            ReconcileOutcome::Ignored(_) => "ignored",
            ReconcileOutcome::Failed { .. } => "failed",
            ReconcileOutcome::AlreadyProcessed => "already_processed",
        }
    }

    /// The record this delivery touched or was linked to.
    pub fn purchase_id(&self) -> Option<PurchaseId> {
        match self {
            ReconcileOutcome::Activated(id)
            | ReconcileOutcome::AlreadyActive(id)
            | ReconcileOutcome::DuplicateRenewal(id)
            | ReconcileOutcome::FailureRecorded(id)
            | ReconcileOutcome::Terminated(id) => Some(*id),
            ReconcileOutcome::Renewed { renewal, .. } => Some(*renewal),
            ReconcileOutcome::Failed { purchase_id, .. } => *purchase_id,
            ReconcileOutcome::Unresolved
            | ReconcileOutcome::Ignored(_)
            | ReconcileOutcome::AlreadyProcessed => None,
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            ReconcileOutcome::Renewed { parent, .. } => Some(format!("parent {}", parent)),
            ReconcileOutcome::Ignored(reason) => Some(reason.clone()),
            ReconcileOutcome::Failed { reason, .. } => Some(reason.clone()),
            _ => None,
        }
    }

    pub(crate) fn failed(purchase_id: Option<PurchaseId>, reason: impl ToString) -> Self {
        ReconcileOutcome::Failed {
            purchase_id,
            reason: reason.to_string(),
        }
    }
}
