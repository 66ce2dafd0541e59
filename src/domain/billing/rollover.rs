//! Rollover onto the recurring organization plan.
//!
//! A rollover starts the platform subscription once a bounded arrangement
//! ends: either a one-time accelerator bundle purchase, or an installment
//! plan that has collected all of its charges.

use std::fmt;

use super::installments::{installment_limit, installments_paid, is_installment_plan};
use super::stripe_event::StripeEventType;
use super::stripe_objects::Metadata;
use super::subscription_status::SubscriptionStatus;

/// Metadata key recording which pathway created a subscription.
pub const ROLLOVER_CONTEXT_KEY: &str = "rollover_context";

/// Pathway that triggered a rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RolloverContext {
    /// One-time accelerator bundle purchase upgraded to the platform plan.
    AcceleratorBundleOneTime,
    /// Installment plan collected every charge.
    AcceleratorInstallmentsComplete,
}

impl RolloverContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceleratorBundleOneTime => "accelerator_bundle_one_time",
            Self::AcceleratorInstallmentsComplete => "accelerator_installments_complete",
        }
    }
}

impl fmt::Display for RolloverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency key for a rollover following a checkout.
pub fn checkout_rollover_key(checkout_session_id: &str) -> String {
    format!("rollover:checkout:{}", checkout_session_id)
}

/// Idempotency key for a rollover following a lifecycle event.
///
/// Redelivery of the same event reuses the key; distinct events get
/// distinct keys and rely on the active-subscription guard instead.
pub fn lifecycle_rollover_key(subscription_id: &str, event_id: &str) -> String {
    format!("rollover:{}:{}", subscription_id, event_id)
}

/// Inputs for [`should_roll_to_organization_plan`].
#[derive(Debug, Clone, Copy)]
pub struct RolloverDecisionInput<'a> {
    pub event_type: StripeEventType,
    pub subscription_status: SubscriptionStatus,
    pub metadata: &'a Metadata,
    pub fallback_limit: u32,
}

/// Decides from a subscription lifecycle event whether to roll over.
///
/// True only for an installment plan that has ended (deleted, or moved to a
/// terminal status) after collecting at least its installment limit.
pub fn should_roll_to_organization_plan(input: RolloverDecisionInput<'_>) -> bool {
    if !input.event_type.is_subscription_lifecycle() {
        return false;
    }
    if !is_installment_plan(input.metadata) {
        return false;
    }
    // A subscription created by a rollover must never trigger another one.
    if input.metadata.contains_key(ROLLOVER_CONTEXT_KEY) {
        return false;
    }

    let ended = input.event_type == StripeEventType::SubscriptionDeleted
        || input.subscription_status.is_terminal();
    if !ended {
        return false;
    }

    installments_paid(input.metadata) >= installment_limit(input.metadata, input.fallback_limit)
}
