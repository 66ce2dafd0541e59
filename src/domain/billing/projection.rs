//! Local mirror of a Stripe subscription.

use super::stripe_objects::{Metadata, SubscriptionObject};
use super::subscription_status::SubscriptionStatus;
use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};

/// Subscription projection row, keyed by Stripe subscription id.
///
/// Every write replaces the whole row; there is no field-level merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionProjection {
    pub subscription_id: SubscriptionId,
    pub user_id: UserId,
    pub customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<Timestamp>,
    pub metadata: Metadata,
    pub updated_at: Timestamp,
}

impl SubscriptionProjection {
    /// Builds a projection; unspecified optional fields stay empty.
    pub fn new(
        user_id: UserId,
        customer_id: Option<String>,
        subscription_id: SubscriptionId,
        status: SubscriptionStatus,
        current_period_end: Option<Timestamp>,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            subscription_id,
            user_id,
            customer_id,
            status,
            current_period_end,
            metadata: metadata.unwrap_or_default(),
            updated_at: Timestamp::now(),
        }
    }

    /// Projects a Stripe subscription object for the given owner.
    pub fn from_stripe(
        user_id: UserId,
        subscription: &SubscriptionObject,
    ) -> Result<Self, crate::domain::foundation::ValidationError> {
        Ok(Self::new(
            user_id,
            subscription.customer_id().map(str::to_string),
            SubscriptionId::new(subscription.id.clone())?,
            SubscriptionStatus::to_status(&subscription.status),
            subscription.period_end().and_then(Timestamp::from_unix_secs),
            Some(subscription.metadata.clone()),
        ))
    }
}
