//! Transaction types recorded on each entitlement record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PurchaseStatus;

/// Why an entitlement record was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    RenewalAttempt,
    RenewalSuccess,
    RenewalFailure,
    SwitchAttempt,
    SwitchSuccess,
    SwitchFailure,
    ManualAdminSwitch,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::RenewalAttempt => "renewal_attempt",
            TransactionType::RenewalSuccess => "renewal_success",
            TransactionType::RenewalFailure => "renewal_failure",
            TransactionType::SwitchAttempt => "switch_attempt",
            TransactionType::SwitchSuccess => "switch_success",
            TransactionType::SwitchFailure => "switch_failure",
            TransactionType::ManualAdminSwitch => "manual_admin_switch",
        }
    }

    /// Status a freshly created record of this type should end up in.
    ///
    /// System-computed outcomes skip the pending step.
    pub fn initial_status(&self) -> PurchaseStatus {
        match self {
            TransactionType::RenewalSuccess
            | TransactionType::SwitchSuccess
            | TransactionType::ManualAdminSwitch => PurchaseStatus::Active,
            TransactionType::RenewalFailure | TransactionType::SwitchFailure => {
                PurchaseStatus::Failed
            }
            TransactionType::Purchase
            | TransactionType::RenewalAttempt
            | TransactionType::SwitchAttempt => PurchaseStatus::PendingPayment,
        }
    }

    /// Terminal status an active parent takes when a record of this type
    /// supersedes it.
    pub fn superseded_parent_status(&self) -> PurchaseStatus {
        if self.is_switch() {
            PurchaseStatus::Switched
        } else {
            PurchaseStatus::Expired
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(
            self,
            TransactionType::SwitchAttempt
                | TransactionType::SwitchSuccess
                | TransactionType::SwitchFailure
                | TransactionType::ManualAdminSwitch
        )
    }

    pub fn is_renewal(&self) -> bool {
        matches!(
            self,
            TransactionType::RenewalAttempt
                | TransactionType::RenewalSuccess
                | TransactionType::RenewalFailure
        )
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(TransactionType::Purchase),
            "renewal_attempt" => Ok(TransactionType::RenewalAttempt),
            "renewal_success" => Ok(TransactionType::RenewalSuccess),
            "renewal_failure" => Ok(TransactionType::RenewalFailure),
            "switch_attempt" => Ok(TransactionType::SwitchAttempt),
            "switch_success" => Ok(TransactionType::SwitchSuccess),
            "switch_failure" => Ok(TransactionType::SwitchFailure),
            "manual_admin_switch" => Ok(TransactionType::ManualAdminSwitch),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_outcomes_start_active() {
        assert_eq!(
            TransactionType::RenewalSuccess.initial_status(),
            PurchaseStatus::Active
        );
        assert_eq!(
            TransactionType::ManualAdminSwitch.initial_status(),
            PurchaseStatus::Active
        );
    }

    #[test]
    fn failures_start_failed() {
        assert_eq!(
            TransactionType::RenewalFailure.initial_status(),
            PurchaseStatus::Failed
        );
        assert_eq!(
            TransactionType::SwitchFailure.initial_status(),
            PurchaseStatus::Failed
        );
    }

    #[test]
    fn purchases_and_attempts_start_pending() {
        assert_eq!(
            TransactionType::Purchase.initial_status(),
            PurchaseStatus::PendingPayment
        );
        assert_eq!(
            TransactionType::SwitchAttempt.initial_status(),
            PurchaseStatus::PendingPayment
        );
    }

    #[test]
    fn switches_mark_parent_switched_renewals_mark_expired() {
        assert_eq!(
            TransactionType::ManualAdminSwitch.superseded_parent_status(),
            PurchaseStatus::Switched
        );
        assert_eq!(
            TransactionType::RenewalSuccess.superseded_parent_status(),
            PurchaseStatus::Expired
        );
    }

    #[test]
    fn rejects_unknown_type() {
        assert!("refund".parse::<TransactionType>().is_err());
        assert_eq!(
            "manual_admin_switch".parse::<TransactionType>(),
            Ok(TransactionType::ManualAdminSwitch)
        );
    }
}
