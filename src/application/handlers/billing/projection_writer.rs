//! ProjectionWriter - keeps the local subscription table in step with Stripe.

use std::sync::Arc;

use crate::domain::billing::{Metadata, SubscriptionObject, SubscriptionProjection, SubscriptionStatus};
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId};
use crate::ports::SubscriptionRepository;

/// Writes subscription projections. Every write replaces the whole row.
#[derive(Clone)]
pub struct ProjectionWriter {
    repository: Arc<dyn SubscriptionRepository>,
}

impl ProjectionWriter {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    /// Upserts the projection for `subscription_id`.
    ///
    /// `status` is normalized with [`SubscriptionStatus::to_status`], so an
    /// unfamiliar Stripe status never fails the write.
    pub async fn upsert(
        &self,
        user_id: UserId,
        customer_id: Option<String>,
        subscription_id: SubscriptionId,
        status: &str,
        current_period_end: Option<Timestamp>,
        metadata: Option<Metadata>,
    ) -> Result<SubscriptionProjection, DomainError> {
        let projection = SubscriptionProjection::new(
            user_id,
            customer_id,
            subscription_id,
            SubscriptionStatus::to_status(status),
            current_period_end,
            metadata,
        );

        self.repository.upsert(&projection).await?;

        tracing::debug!(
            subscription_id = %projection.subscription_id,
            user_id = %projection.user_id,
            status = %projection.status,
            "Subscription projection written"
        );

        Ok(projection)
    }

    /// Projects a Stripe subscription object for its owner.
    pub async fn write_subscription(
        &self,
        user_id: UserId,
        subscription: &SubscriptionObject,
    ) -> Result<SubscriptionProjection, DomainError> {
        let subscription_id = SubscriptionId::new(subscription.id.clone())?;

        self.upsert(
            user_id,
            subscription.customer_id().map(str::to_string),
            subscription_id,
            &subscription.status,
            subscription.period_end().and_then(Timestamp::from_unix_secs),
            Some(subscription.metadata.clone()),
        )
        .await
    }

    /// Owner of a subscription: `metadata.user_id`, else the user on the
    /// projection already stored for it.
    pub async fn resolve_owner(
        &self,
        subscription: &SubscriptionObject,
    ) -> Result<Option<UserId>, DomainError> {
        if let Some(user_id) = subscription
            .metadata_user_id()
            .and_then(|raw| UserId::new(raw).ok())
        {
            return Ok(Some(user_id));
        }

        let Ok(subscription_id) = SubscriptionId::new(subscription.id.clone()) else {
            return Ok(None);
        };

        Ok(self
            .repository
            .find_by_subscription_id(&subscription_id)
            .await?
            .map(|existing| existing.user_id))
    }
}
