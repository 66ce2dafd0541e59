//! In-memory subscription projections.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::FailNext;
use crate::domain::billing::SubscriptionProjection;
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::ports::SubscriptionRepository;

/// In-memory projections keyed by subscription id.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionRepository {
    rows: Arc<RwLock<HashMap<String, SubscriptionProjection>>>,
    upserts: Arc<RwLock<Vec<SubscriptionProjection>>>,
    fail_upserts: FailNext,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a projection directly, bypassing the upsert log.
    pub async fn seed(&self, projection: SubscriptionProjection) {
        self.rows
            .write()
            .await
            .insert(projection.subscription_id.as_str().to_string(), projection);
    }

    pub async fn get(&self, subscription_id: &str) -> Option<SubscriptionProjection> {
        self.rows.read().await.get(subscription_id).cloned()
    }

    /// Every projection passed to `upsert`, in call order.
    pub async fn upserts(&self) -> Vec<SubscriptionProjection> {
        self.upserts.read().await.clone()
    }

    pub fn fail_upserts(&self) -> &FailNext {
        &self.fail_upserts
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn upsert(&self, projection: &SubscriptionProjection) -> Result<(), DomainError> {
        if self.fail_upserts.take() {
            return Err(DomainError::database("injected subscription upsert failure"));
        }

        self.upserts.write().await.push(projection.clone());
        self.rows.write().await.insert(
            projection.subscription_id.as_str().to_string(),
            projection.clone(),
        );
        Ok(())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<SubscriptionProjection>, DomainError> {
        Ok(self.get(subscription_id.as_str()).await)
    }

    async fn find_active_or_trialing_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionProjection>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| &row.user_id == user_id && row.status.is_active_or_trialing())
            .max_by_key(|row| row.updated_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::SubscriptionStatus;

    fn projection(sub: &str, user: &str, status: SubscriptionStatus) -> SubscriptionProjection {
        SubscriptionProjection::new(
            UserId::new(user).unwrap(),
            None,
            SubscriptionId::new(sub).unwrap(),
            status,
            None,
            None,
        )
    }

    #[tokio::test]
    async fn upsert_replaces_row() {
        let repo = InMemorySubscriptionRepository::new();

        repo.upsert(&projection("sub_1", "u1", SubscriptionStatus::Trialing))
            .await
            .unwrap();
        repo.upsert(&projection("sub_1", "u1", SubscriptionStatus::PastDue))
            .await
            .unwrap();

        assert_eq!(
            repo.get("sub_1").await.unwrap().status,
            SubscriptionStatus::PastDue
        );
        assert_eq!(repo.upserts().await.len(), 2);
    }

    #[tokio::test]
    async fn active_lookup_ignores_ended_and_other_users() {
        let repo = InMemorySubscriptionRepository::new();
        repo.seed(projection("sub_1", "u1", SubscriptionStatus::Canceled))
            .await;
        repo.seed(projection("sub_2", "u2", SubscriptionStatus::Active))
            .await;

        let user = UserId::new("u1").unwrap();
        assert!(repo
            .find_active_or_trialing_for_user(&user)
            .await
            .unwrap()
            .is_none());

        repo.seed(projection("sub_3", "u1", SubscriptionStatus::Trialing))
            .await;
        let found = repo
            .find_active_or_trialing_for_user(&user)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.subscription_id.as_str(), "sub_3");
    }

    #[tokio::test]
    async fn injected_failure_leaves_row_untouched() {
        let repo = InMemorySubscriptionRepository::new();
        repo.fail_upserts().arm(1);

        assert!(repo
            .upsert(&projection("sub_1", "u1", SubscriptionStatus::Active))
            .await
            .is_err());
        assert!(repo.get("sub_1").await.is_none());
    }
}
