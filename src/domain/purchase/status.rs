//! Purchase status state machine.
//!
//! Defines the states an entitlement record moves through and which
//! transitions are legal. Terminal statuses never transition again;
//! corrections create new records instead.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an entitlement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// Created, waiting for the provider to confirm payment.
    PendingPayment,

    /// Payment confirmed; the entitlement is in force.
    Active,

    /// Reached the end of its term or was superseded by a renewal.
    Expired,

    /// Cancelled at the provider or by an operator.
    Cancelled,

    /// Payment failed. Never reactivated.
    Failed,

    /// Superseded by a plan switch.
    Switched,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::PendingPayment => "pending_payment",
            PurchaseStatus::Active => "active",
            PurchaseStatus::Expired => "expired",
            PurchaseStatus::Cancelled => "cancelled",
            PurchaseStatus::Failed => "failed",
            PurchaseStatus::Switched => "switched",
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(PurchaseStatus::PendingPayment),
            "active" => Ok(PurchaseStatus::Active),
            "expired" => Ok(PurchaseStatus::Expired),
            "cancelled" => Ok(PurchaseStatus::Cancelled),
            "failed" => Ok(PurchaseStatus::Failed),
            "switched" => Ok(PurchaseStatus::Switched),
            other => Err(format!("unknown purchase status: {}", other)),
        }
    }
}

impl StateMachine for PurchaseStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PurchaseStatus::*;
        matches!(
            (self, target),
            // From PENDING_PAYMENT
            (PendingPayment, Active)
                | (PendingPayment, Failed)
                | (PendingPayment, Cancelled)
                | (PendingPayment, Expired)
            // From ACTIVE
                | (Active, Expired)
                | (Active, Cancelled)
                | (Active, Switched)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PurchaseStatus::*;
        match self {
            PendingPayment => vec![Active, Failed, Cancelled, Expired],
            Active => vec![Expired, Cancelled, Switched],
            Expired | Cancelled | Failed | Switched => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_activate_or_fail() {
        let status = PurchaseStatus::PendingPayment;
        assert_eq!(
            status.transition_to(PurchaseStatus::Active),
            Ok(PurchaseStatus::Active)
        );
        assert_eq!(
            status.transition_to(PurchaseStatus::Failed),
            Ok(PurchaseStatus::Failed)
        );
    }

    #[test]
    fn active_never_flips_to_failed() {
        assert!(!PurchaseStatus::Active.can_transition_to(&PurchaseStatus::Failed));
    }

    #[test]
    fn active_can_be_superseded() {
        assert!(PurchaseStatus::Active.can_transition_to(&PurchaseStatus::Expired));
        assert!(PurchaseStatus::Active.can_transition_to(&PurchaseStatus::Switched));
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        for status in [
            PurchaseStatus::Expired,
            PurchaseStatus::Cancelled,
            PurchaseStatus::Failed,
            PurchaseStatus::Switched,
        ] {
            assert!(status.is_terminal(), "{} should be terminal", status);
            assert!(status.transition_to(PurchaseStatus::Active).is_err());
        }
    }

    #[test]
    fn parses_stored_representation() {
        assert_eq!(
            "pending_payment".parse::<PurchaseStatus>(),
            Ok(PurchaseStatus::PendingPayment)
        );
        assert!("paused".parse::<PurchaseStatus>().is_err());
    }
}
