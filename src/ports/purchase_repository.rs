//! Purchase repository port - the entitlement record store.
//!
//! Defines the contract for persisting and retrieving entitlement records.
//! The lifecycle manager is the only writer.
//!
//! # Constraints implementations must enforce
//!
//! - At most one `active` record per (user_id, feature_key)
//!   → `ActiveEntitlementExists`
//! - `api_key` and `license_key` are each globally unique
//!   → `CredentialConflict`
//! - At most one `renewal_success` / `renewal_failure` record per
//!   (gateway_id, transaction_id) → `DuplicateTransaction`

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, FeatureKey, GatewayId, PurchaseId, UserId};
use crate::domain::purchase::{CredentialKind, Purchase, TransactionType};

/// Repository port for entitlement records.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// - `ActiveEntitlementExists`, `CredentialConflict`, `DuplicateTransaction`
    ///   on constraint violations
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, purchase: &Purchase) -> Result<(), DomainError>;

    /// Overwrite an existing record.
    ///
    /// # Errors
    ///
    /// - `PurchaseNotFound` if the record doesn't exist
    /// - constraint errors as for `insert`
    async fn update(&self, purchase: &Purchase) -> Result<(), DomainError>;

    /// Write a retiring parent and its activated successor in one transaction.
    ///
    /// The parent is written first so a credential it released is free
    /// before the successor claims it. Either both writes land or neither.
    async fn supersede(&self, parent: &Purchase, successor: &Purchase) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError>;

    /// The active record for (user, feature), if any.
    async fn find_active(
        &self,
        user_id: &UserId,
        feature_key: &FeatureKey,
    ) -> Result<Option<Purchase>, DomainError>;

    /// The record currently holding `value` as its api key or license key.
    async fn find_by_credential(&self, value: &str) -> Result<Option<Purchase>, DomainError>;

    /// Returns true if any record other than `excluding` holds `value` in
    /// the column for `kind`.
    async fn credential_in_use(
        &self,
        kind: CredentialKind,
        value: &str,
        excluding: Option<&PurchaseId>,
    ) -> Result<bool, DomainError>;

    /// Most recently created record carrying this gateway subscription id.
    async fn find_latest_by_subscription(
        &self,
        gateway_id: &GatewayId,
        subscription_id: &str,
    ) -> Result<Option<Purchase>, DomainError>;

    /// Most recently created record carrying this transaction reference,
    /// optionally restricted to one transaction type.
    async fn find_latest_by_transaction(
        &self,
        gateway_id: &GatewayId,
        transaction_id: &str,
        transaction_type: Option<TransactionType>,
    ) -> Result<Option<Purchase>, DomainError>;

    /// Every record of a user, newest first.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn PurchaseRepository) {}
}
