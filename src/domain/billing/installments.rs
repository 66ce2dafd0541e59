//! Installment progress for accelerator payment plans.
//!
//! An installment plan is an ordinary Stripe subscription whose metadata
//! carries a target number of charges and the count paid so far. Each
//! renewal charge advances the count; when the count reaches the limit the
//! subscription is flagged to cancel at period end.

use super::stripe_objects::Metadata;

/// Metadata key holding the number of charges the plan runs for.
pub const INSTALLMENT_LIMIT_KEY: &str = "accelerator_installment_limit";

/// Metadata key holding the number of charges collected so far.
pub const INSTALLMENTS_PAID_KEY: &str = "accelerator_installments_paid";

/// `metadata.kind` value set on installment subscriptions at checkout.
pub const INSTALLMENT_KIND: &str = "accelerator_installments";

/// Only renewal invoices count toward the cap.
pub const RENEWAL_BILLING_REASON: &str = "subscription_cycle";

/// Inputs for [`calculate_installment_progress`].
#[derive(Debug, Clone, Copy)]
pub struct InstallmentInput<'a> {
    pub billing_reason: Option<&'a str>,
    pub metadata: &'a Metadata,
    pub cancel_at_period_end: bool,
    pub fallback_limit: u32,
}

/// Result of evaluating one paid invoice against the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallmentProgress {
    pub eligible: bool,
    pub installment_limit: u32,
    pub next_installments_paid: u32,
    pub should_set_cancel_at_period_end: bool,
}

impl InstallmentProgress {
    /// Metadata entries to push back to Stripe for an eligible charge.
    pub fn metadata_update(&self) -> Metadata {
        let mut update = Metadata::new();
        update.insert(
            INSTALLMENT_LIMIT_KEY.to_string(),
            self.installment_limit.to_string(),
        );
        update.insert(
            INSTALLMENTS_PAID_KEY.to_string(),
            self.next_installments_paid.to_string(),
        );
        update
    }
}

/// Reads a positive counter from metadata.
fn positive_count(metadata: &Metadata, key: &str) -> Option<u32> {
    metadata
        .get(key)
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

/// Stored installment limit, or `fallback` when absent or invalid.
pub fn installment_limit(metadata: &Metadata, fallback: u32) -> u32 {
    positive_count(metadata, INSTALLMENT_LIMIT_KEY).unwrap_or(fallback)
}

/// Stored paid count; absent or unparseable means none paid.
pub fn installments_paid(metadata: &Metadata) -> u32 {
    metadata
        .get(INSTALLMENTS_PAID_KEY)
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// True when the subscription metadata marks it as an installment plan.
pub fn is_installment_plan(metadata: &Metadata) -> bool {
    metadata.get("kind").map(String::as_str) == Some(INSTALLMENT_KIND)
        || metadata.contains_key(INSTALLMENT_LIMIT_KEY)
        || metadata.contains_key(INSTALLMENTS_PAID_KEY)
}

/// Decides whether a paid invoice advances the installment count.
///
/// Pure: persistence and Stripe updates are the caller's job. The counts
/// are computed even for ineligible charges; callers apply nothing unless
/// `eligible` is set.
pub fn calculate_installment_progress(input: InstallmentInput<'_>) -> InstallmentProgress {
    let installment_limit = installment_limit(input.metadata, input.fallback_limit);
    let next_installments_paid = installments_paid(input.metadata).saturating_add(1);

    let eligible =
        input.billing_reason == Some(RENEWAL_BILLING_REASON) && !input.cancel_at_period_end;

    InstallmentProgress {
        eligible,
        installment_limit,
        next_installments_paid,
        should_set_cancel_at_period_end: next_installments_paid >= installment_limit,
    }
}
