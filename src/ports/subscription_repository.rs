//! SubscriptionRepository port - local subscription projections.

use async_trait::async_trait;

use crate::domain::billing::SubscriptionProjection;
use crate::domain::foundation::{DomainError, SubscriptionId, UserId};

/// Port for reading and writing subscription projections.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Inserts or fully replaces the row keyed by subscription id.
    async fn upsert(&self, projection: &SubscriptionProjection) -> Result<(), DomainError>;

    /// Finds the projection for a Stripe subscription id.
    async fn find_by_subscription_id(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<SubscriptionProjection>, DomainError>;

    /// Finds any projection for the user whose status is active or trialing.
    async fn find_active_or_trialing_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionProjection>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SubscriptionRepository) {}
    }
}
