//! Read interface for entitlement checks. No side effects.

use crate::domain::foundation::{FeatureKey, PurchaseId, Timestamp, UserId};
use crate::domain::purchase::{Purchase, PurchaseError};

use super::LifecycleManager;

impl LifecycleManager {
    pub async fn get_purchase(&self, id: &PurchaseId) -> Result<Purchase, PurchaseError> {
        self.load(id).await
    }

    /// The active record for (user, feature), if any.
    pub async fn current_entitlement(
        &self,
        user_id: &UserId,
        feature_key: &FeatureKey,
    ) -> Result<Option<Purchase>, PurchaseError> {
        Ok(self.purchases.find_active(user_id, feature_key).await?)
    }

    /// Returns true if the user may use the feature right now.
    ///
    /// An active record past its expiry date does not count; nothing
    /// expires records in the background.
    pub async fn is_entitled(
        &self,
        user_id: &UserId,
        feature_key: &FeatureKey,
    ) -> Result<bool, PurchaseError> {
        let now = Timestamp::now();
        Ok(self
            .current_entitlement(user_id, feature_key)
            .await?
            .is_some_and(|record| record.is_entitled(now)))
    }

    /// The record holding `credential` as its api key or license key.
    pub async fn entitlement_by_credential(
        &self,
        credential: &str,
    ) -> Result<Option<Purchase>, PurchaseError> {
        if credential.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.purchases.find_by_credential(credential).await?)
    }

    /// Every record of a user, newest first.
    pub async fn purchase_history(&self, user_id: &UserId) -> Result<Vec<Purchase>, PurchaseError> {
        Ok(self.purchases.list_by_user(user_id).await?)
    }
}
