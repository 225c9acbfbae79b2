//! Plans and features.
//!
//! A feature is a purchasable capability; a plan is one priced tier of it.
//! Records keep a point-in-time copy of the plan so later plan edits do not
//! rewrite history.

use crate::domain::foundation::{FeatureKey, PlanId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of secret a feature hands out to prove entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    None,
    ApiKey,
    LicenseKey,
}

impl CredentialKind {
    pub fn requires_credential(&self) -> bool {
        !matches!(self, CredentialKind::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::None => "none",
            CredentialKind::ApiKey => "api_key",
            CredentialKind::LicenseKey => "license_key",
        }
    }
}

impl FromStr for CredentialKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CredentialKind::None),
            "api_key" => Ok(CredentialKind::ApiKey),
            "license_key" => Ok(CredentialKind::LicenseKey),
            other => Err(format!("unknown credential kind: {}", other)),
        }
    }
}

/// A purchasable capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub key: FeatureKey,
    pub name: String,
    pub credential_kind: CredentialKind,
}

impl Feature {
    pub fn new(key: FeatureKey, name: impl Into<String>, credential_kind: CredentialKind) -> Self {
        Self {
            key,
            name: name.into(),
            credential_kind,
        }
    }
}

/// How a plan bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    /// Charged again every `duration_days`.
    Recurring,
    /// Paid once, never expires.
    OneTime,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Recurring => "recurring",
            BillingCycle::OneTime => "one_time",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recurring" => Ok(BillingCycle::Recurring),
            "one_time" => Ok(BillingCycle::OneTime),
            other => Err(format!("unknown billing cycle: {}", other)),
        }
    }
}

/// A priced tier of a feature.
///
/// # Invariants
///
/// - Recurring plans have a positive `duration_days`
/// - One-time plans have no duration (they never expire)
/// - `price_cents` is never negative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub feature_key: FeatureKey,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub duration_days: Option<i64>,
    pub requests_per_day: Option<i64>,
    pub requests_per_month: Option<i64>,
    pub active: bool,
}

impl Plan {
    /// Creates a recurring plan that renews every `duration_days`.
    pub fn recurring(
        id: PlanId,
        feature_key: FeatureKey,
        name: impl Into<String>,
        price_cents: i64,
        currency: impl Into<String>,
        duration_days: i64,
    ) -> Result<Self, ValidationError> {
        let plan = Self {
            id,
            feature_key,
            name: name.into(),
            price_cents,
            currency: currency.into(),
            billing_cycle: BillingCycle::Recurring,
            duration_days: Some(duration_days),
            requests_per_day: None,
            requests_per_month: None,
            active: true,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Creates a one-time plan with no expiry.
    pub fn one_time(
        id: PlanId,
        feature_key: FeatureKey,
        name: impl Into<String>,
        price_cents: i64,
        currency: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let plan = Self {
            id,
            feature_key,
            name: name.into(),
            price_cents,
            currency: currency.into(),
            billing_cycle: BillingCycle::OneTime,
            duration_days: None,
            requests_per_day: None,
            requests_per_month: None,
            active: true,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Sets usage limits copied onto records bought under this plan.
    pub fn with_limits(mut self, per_day: Option<i64>, per_month: Option<i64>) -> Self {
        self.requests_per_day = per_day;
        self.requests_per_month = per_month;
        self
    }

    /// Checks the plan invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.price_cents < 0 {
            return Err(ValidationError::out_of_range(
                "price_cents",
                0,
                i64::MAX,
                self.price_cents,
            ));
        }
        match (self.billing_cycle, self.duration_days) {
            (BillingCycle::Recurring, Some(days)) if days > 0 => Ok(()),
            (BillingCycle::Recurring, Some(days)) => Err(ValidationError::out_of_range(
                "duration_days",
                1,
                i64::MAX,
                days,
            )),
            (BillingCycle::Recurring, None) => Err(ValidationError::empty_field("duration_days")),
            (BillingCycle::OneTime, None) => Ok(()),
            (BillingCycle::OneTime, Some(_)) => Err(ValidationError::invalid_format(
                "duration_days",
                "one-time plans never expire",
            )),
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.billing_cycle == BillingCycle::Recurring
    }

    /// Expiry for a record activated at `activated_at`; `None` means it never expires.
    pub fn expiry_from(&self, activated_at: Timestamp) -> Option<Timestamp> {
        match self.billing_cycle {
            BillingCycle::Recurring => self.duration_days.map(|days| activated_at.add_days(days)),
            BillingCycle::OneTime => None,
        }
    }
}
