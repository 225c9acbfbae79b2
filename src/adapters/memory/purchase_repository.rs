//! In-memory purchase repository.
//!
//! Enforces the same unique constraints as the PostgreSQL schema so tests
//! exercise the real conflict paths. `supersede` stages both writes and
//! commits them together.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{
    DomainError, ErrorCode, FeatureKey, GatewayId, PurchaseId, UserId,
};
use crate::domain::purchase::{CredentialKind, Purchase, PurchaseStatus, TransactionType};
use crate::ports::PurchaseRepository;

/// Records kept in creation order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPurchaseRepository {
    records: Arc<RwLock<Vec<Purchase>>>,
    fail_supersede: Arc<AtomicBool>,
}

impl InMemoryPurchaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `supersede` call fail without writing anything.
    pub fn fail_next_supersede(&self) {
        self.fail_supersede.store(true, Ordering::SeqCst);
    }

    /// Every stored record, in creation order.
    pub async fn snapshot(&self) -> Vec<Purchase> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Rows that claim their charge reference. A renewal that failed to
/// activate gives the reference back so a redelivery can retry it.
fn claims_reference(record: &Purchase) -> bool {
    match record.transaction_type {
        TransactionType::RenewalSuccess => record.status != PurchaseStatus::Failed,
        TransactionType::RenewalFailure => true,
        _ => false,
    }
}

fn check_constraints(records: &[Purchase], candidate: &Purchase) -> Result<(), DomainError> {
    for other in records.iter().filter(|r| r.id != candidate.id) {
        if candidate.status == PurchaseStatus::Active
            && other.status == PurchaseStatus::Active
            && other.user_id == candidate.user_id
            && other.feature_key == candidate.feature_key
        {
            return Err(DomainError::new(
                ErrorCode::ActiveEntitlementExists,
                "An active entitlement already exists for this user and feature",
            )
            .with_detail("user_id", candidate.user_id.to_string())
            .with_detail("feature_key", candidate.feature_key.to_string()));
        }

        let same_key = |a: &Option<String>, b: &Option<String>| a.is_some() && a == b;
        if same_key(&candidate.api_key, &other.api_key)
            || same_key(&candidate.license_key, &other.license_key)
        {
            return Err(DomainError::new(
                ErrorCode::CredentialConflict,
                "Credential is already assigned to another purchase",
            )
            .with_detail("purchase_id", candidate.id.to_string()));
        }

        if claims_reference(candidate)
            && claims_reference(other)
            && other.transaction_type == candidate.transaction_type
            && other.gateway_id == candidate.gateway_id
            && candidate.transaction_id.is_some()
            && other.transaction_id == candidate.transaction_id
        {
            return Err(DomainError::new(
                ErrorCode::DuplicateTransaction,
                "Transaction already recorded",
            )
            .with_detail(
                "transaction_id",
                candidate.transaction_id.clone().unwrap_or_default(),
            ));
        }
    }
    Ok(())
}

fn replace(records: &mut [Purchase], purchase: &Purchase) -> Result<(), DomainError> {
    let slot = records
        .iter_mut()
        .find(|r| r.id == purchase.id)
        .ok_or_else(|| {
            DomainError::new(ErrorCode::PurchaseNotFound, "Purchase not found")
                .with_detail("purchase_id", purchase.id.to_string())
        })?;
    *slot = purchase.clone();
    Ok(())
}

#[async_trait]
impl PurchaseRepository for InMemoryPurchaseRepository {
    async fn insert(&self, purchase: &Purchase) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == purchase.id) {
            return Err(DomainError::database(
                "insert purchase",
                format!("duplicate id {}", purchase.id),
            ));
        }
        check_constraints(&records, purchase)?;
        records.push(purchase.clone());
        Ok(())
    }

    async fn update(&self, purchase: &Purchase) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        check_constraints(&records, purchase)?;
        replace(&mut records, purchase)
    }

    async fn supersede(&self, parent: &Purchase, successor: &Purchase) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        if self.fail_supersede.swap(false, Ordering::SeqCst) {
            return Err(DomainError::database("supersede", "injected failure"));
        }

        let mut staged = records.clone();
        check_constraints(&staged, parent)?;
        replace(&mut staged, parent)?;
        check_constraints(&staged, successor)?;
        replace(&mut staged, successor)?;
        *records = staged;
        Ok(())
    }

    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == *id).cloned())
    }

    async fn find_active(
        &self,
        user_id: &UserId,
        feature_key: &FeatureKey,
    ) -> Result<Option<Purchase>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| {
                r.status == PurchaseStatus::Active
                    && r.user_id == *user_id
                    && r.feature_key == *feature_key
            })
            .cloned())
    }

    async fn find_by_credential(&self, value: &str) -> Result<Option<Purchase>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.api_key.as_deref() == Some(value) || r.license_key.as_deref() == Some(value))
            .cloned())
    }

    async fn credential_in_use(
        &self,
        kind: CredentialKind,
        value: &str,
        excluding: Option<&PurchaseId>,
    ) -> Result<bool, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| Some(&r.id) != excluding)
            .any(|r| match kind {
                CredentialKind::LicenseKey => r.license_key.as_deref() == Some(value),
                CredentialKind::ApiKey | CredentialKind::None => {
                    r.api_key.as_deref() == Some(value)
                }
            }))
    }

    async fn find_latest_by_subscription(
        &self,
        gateway_id: &GatewayId,
        subscription_id: &str,
    ) -> Result<Option<Purchase>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .find(|r| {
                r.gateway_id == *gateway_id
                    && r.gateway_subscription_id.as_deref() == Some(subscription_id)
            })
            .cloned())
    }

    async fn find_latest_by_transaction(
        &self,
        gateway_id: &GatewayId,
        transaction_id: &str,
        transaction_type: Option<TransactionType>,
    ) -> Result<Option<Purchase>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .find(|r| {
                r.gateway_id == *gateway_id
                    && r.transaction_id.as_deref() == Some(transaction_id)
                    && transaction_type.map_or(true, |t| r.transaction_type == t)
            })
            .cloned())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.user_id == *user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{PlanId, Timestamp};
    use crate::domain::purchase::{PaymentDetails, Plan};

    fn plan() -> Plan {
        Plan::recurring(
            PlanId::new("basic").unwrap(),
            FeatureKey::new("geo-api").unwrap(),
            "Basic",
            900,
            "USD",
            30,
        )
        .unwrap()
    }

    fn record(transaction_type: TransactionType) -> Purchase {
        Purchase::new_pending(
            PurchaseId::new(),
            UserId::new("user-1").unwrap(),
            &plan(),
            GatewayId::stripe(),
            transaction_type,
            None,
            Timestamp::now(),
        )
    }

    fn active() -> Purchase {
        let mut r = record(TransactionType::Purchase);
        r.activate(Timestamp::now(), &PaymentDetails::default()).unwrap();
        r
    }

    #[tokio::test]
    async fn second_active_record_is_rejected() {
        let repo = InMemoryPurchaseRepository::new();
        repo.insert(&active()).await.unwrap();

        let err = repo.insert(&active()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ActiveEntitlementExists);
    }

    #[tokio::test]
    async fn shared_api_key_is_rejected() {
        let repo = InMemoryPurchaseRepository::new();
        let mut first = record(TransactionType::Purchase);
        first.api_key = Some("k".to_string());
        repo.insert(&first).await.unwrap();

        let mut second = record(TransactionType::Purchase);
        second.api_key = Some("k".to_string());
        let err = repo.insert(&second).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::CredentialConflict);
        assert!(repo
            .credential_in_use(CredentialKind::ApiKey, "k", None)
            .await
            .unwrap());
        assert!(!repo
            .credential_in_use(CredentialKind::ApiKey, "k", Some(&first.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn renewal_reference_is_unique_per_gateway() {
        let repo = InMemoryPurchaseRepository::new();
        let mut first = record(TransactionType::RenewalSuccess);
        first.transaction_id = Some("in_1".to_string());
        repo.insert(&first).await.unwrap();

        let mut same = record(TransactionType::RenewalSuccess);
        same.transaction_id = Some("in_1".to_string());
        let err = repo.insert(&same).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateTransaction);

        let mut other_gateway = record(TransactionType::RenewalSuccess);
        other_gateway.gateway_id = GatewayId::razorpay();
        other_gateway.transaction_id = Some("in_1".to_string());
        repo.insert(&other_gateway).await.unwrap();
    }

    #[tokio::test]
    async fn failed_renewal_releases_its_reference() {
        let repo = InMemoryPurchaseRepository::new();
        let mut failed = record(TransactionType::RenewalSuccess);
        failed.transaction_id = Some("in_1".to_string());
        failed.status = PurchaseStatus::Failed;
        repo.insert(&failed).await.unwrap();

        let mut retry = record(TransactionType::RenewalSuccess);
        retry.transaction_id = Some("in_1".to_string());
        repo.insert(&retry).await.unwrap();

        let mut failure = record(TransactionType::RenewalFailure);
        failure.transaction_id = Some("in_1".to_string());
        failure.status = PurchaseStatus::Failed;
        repo.insert(&failure).await.unwrap();
        let mut again = failure.clone();
        again.id = PurchaseId::new();
        let err = repo.insert(&again).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateTransaction);
    }

    #[tokio::test]
    async fn failed_supersede_writes_nothing() {
        let repo = InMemoryPurchaseRepository::new();
        let parent = active();
        repo.insert(&parent).await.unwrap();
        let child = record(TransactionType::RenewalSuccess);
        repo.insert(&child).await.unwrap();

        let mut retired = parent.clone();
        retired
            .supersede(PurchaseStatus::Expired, Timestamp::now())
            .unwrap();
        let mut activated = child.clone();
        activated
            .activate(Timestamp::now(), &PaymentDetails::default())
            .unwrap();

        repo.fail_next_supersede();
        assert!(repo.supersede(&retired, &activated).await.is_err());
        assert_eq!(
            repo.find_by_id(&parent.id).await.unwrap().unwrap().status,
            PurchaseStatus::Active
        );

        repo.supersede(&retired, &activated).await.unwrap();
        assert_eq!(
            repo.find_by_id(&child.id).await.unwrap().unwrap().status,
            PurchaseStatus::Active
        );
    }

    #[tokio::test]
    async fn latest_by_subscription_prefers_newest() {
        let repo = InMemoryPurchaseRepository::new();
        let mut older = record(TransactionType::Purchase);
        older.gateway_subscription_id = Some("sub_1".to_string());
        let mut newer = record(TransactionType::RenewalFailure);
        newer.gateway_subscription_id = Some("sub_1".to_string());
        repo.insert(&older).await.unwrap();
        repo.insert(&newer).await.unwrap();

        let found = repo
            .find_latest_by_subscription(&GatewayId::stripe(), "sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, newer.id);
        assert_eq!(
            repo.list_by_user(&UserId::new("user-1").unwrap())
                .await
                .unwrap()[0]
                .id,
            newer.id
        );
    }
}
