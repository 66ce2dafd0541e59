//! RolloverInitiator - starts the organization plan after an accelerator ends.
//!
//! The check for an existing active subscription and the Stripe create call
//! run under a per-user claim, so two deliveries racing for the same user
//! cannot both pass the check.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::billing::{
    Metadata, RolloverContext, WebhookError, ROLLOVER_CONTEXT_KEY,
};
use crate::domain::foundation::{SubscriptionId, UserId};
use crate::ports::{
    BillingProvider, CreateSubscriptionRequest, RolloverClaims, SubscriptionRepository,
};

use super::projection_writer::ProjectionWriter;

/// Request to start the organization plan for a user.
#[derive(Debug, Clone)]
pub struct RolloverRequest {
    pub user_id: UserId,
    pub customer_id: String,
    /// Forwarded to Stripe; a repeated key returns the original subscription.
    pub idempotency_key: String,
    pub trial_period_days: Option<u32>,
    pub context: RolloverContext,
}

/// What a rollover attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverOutcome {
    /// No platform price or no Stripe client configured.
    Disabled,
    /// The user already has an active or trialing subscription.
    AlreadySubscribed { subscription_id: SubscriptionId },
    /// A subscription was created (or returned for a repeated key).
    Started { subscription_id: SubscriptionId },
}

/// Guarded creation of follow-on organization plan subscriptions.
pub struct RolloverInitiator {
    provider: Option<Arc<dyn BillingProvider>>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    claims: Arc<dyn RolloverClaims>,
    projections: ProjectionWriter,
    platform_price_id: Option<String>,
    claim_lease: Duration,
}

impl RolloverInitiator {
    pub fn new(
        provider: Option<Arc<dyn BillingProvider>>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        claims: Arc<dyn RolloverClaims>,
        platform_price_id: Option<String>,
        claim_lease: Duration,
    ) -> Self {
        Self {
            provider,
            projections: ProjectionWriter::new(Arc::clone(&subscriptions)),
            subscriptions,
            claims,
            platform_price_id,
            claim_lease,
        }
    }

    /// Starts the organization plan unless the user already has one.
    ///
    /// Disabled configuration is a silent no-op. A claim held by another
    /// request is a retryable [`WebhookError::RolloverInProgress`] so the
    /// delivery stays unprocessed. Provider and database failures propagate;
    /// a claim taken here is released either way.
    pub async fn maybe_start(
        &self,
        request: RolloverRequest,
    ) -> Result<RolloverOutcome, WebhookError> {
        let (Some(provider), Some(price_id)) =
            (self.provider.as_ref(), self.platform_price_id.as_deref())
        else {
            tracing::debug!(
                user_id = %request.user_id,
                context = %request.context,
                "Rollover disabled, skipping"
            );
            return Ok(RolloverOutcome::Disabled);
        };

        let claim = match self
            .claims
            .try_claim(&request.user_id, self.claim_lease)
            .await?
        {
            Some(claim) => claim,
            None => {
                tracing::warn!(
                    user_id = %request.user_id,
                    context = %request.context,
                    "Rollover already in progress for user"
                );
                return Err(WebhookError::RolloverInProgress(
                    request.user_id.to_string(),
                ));
            }
        };

        let result = self.start_claimed(&**provider, price_id, &request).await;

        if let Err(e) = self.claims.release(&claim).await {
            tracing::warn!(
                user_id = %request.user_id,
                error = %e,
                "Failed to release rollover claim; it will expire"
            );
        }

        result
    }

    async fn start_claimed(
        &self,
        provider: &dyn BillingProvider,
        price_id: &str,
        request: &RolloverRequest,
    ) -> Result<RolloverOutcome, WebhookError> {
        if let Some(existing) = self
            .subscriptions
            .find_active_or_trialing_for_user(&request.user_id)
            .await?
        {
            tracing::info!(
                user_id = %request.user_id,
                subscription_id = %existing.subscription_id,
                context = %request.context,
                "User already subscribed, skipping rollover"
            );
            return Ok(RolloverOutcome::AlreadySubscribed {
                subscription_id: existing.subscription_id,
            });
        }

        let mut metadata = Metadata::new();
        metadata.insert("user_id".to_string(), request.user_id.as_str().to_string());
        metadata.insert(
            ROLLOVER_CONTEXT_KEY.to_string(),
            request.context.as_str().to_string(),
        );

        let mut subscription = provider
            .create_subscription(CreateSubscriptionRequest {
                customer_id: request.customer_id.clone(),
                price_id: price_id.to_string(),
                trial_period_days: request.trial_period_days,
                metadata: metadata.clone(),
                idempotency_key: request.idempotency_key.clone(),
            })
            .await?;

        // Stripe echoes metadata back; keep the context even if it did not.
        for (key, value) in metadata {
            subscription.metadata.entry(key).or_insert(value);
        }

        let projection = self
            .projections
            .write_subscription(request.user_id.clone(), &subscription)
            .await?;

        tracing::info!(
            user_id = %request.user_id,
            subscription_id = %projection.subscription_id,
            context = %request.context,
            trial_period_days = ?request.trial_period_days,
            "Rolled user onto organization plan"
        );

        Ok(RolloverOutcome::Started {
            subscription_id: projection.subscription_id,
        })
    }
}
