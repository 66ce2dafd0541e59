//! Billing domain module.
//!
//! Stripe webhook processing and subscription reconciliation rules.
//!
//! # Module Structure
//!
//! - `stripe_event` / `stripe_objects` - Typed views over webhook payloads
//! - `webhook_verifier` - Stripe-Signature verification
//! - `ledger` - Deduplication envelope and decision
//! - `subscription_status` - Local status enum and normalization
//! - `projection` - Local subscription mirror
//! - `installments` - Installment cap calculator
//! - `rollover` - Follow-on plan decision and idempotency keys
//! - `purchase` - One-time purchase records

mod installments;
mod ledger;
mod projection;
mod purchase;
mod rollover;
mod stripe_event;
mod stripe_objects;
mod subscription_status;
mod webhook_errors;
mod webhook_verifier;

pub use installments::{
    calculate_installment_progress, installment_limit, installments_paid, is_installment_plan,
    InstallmentInput, InstallmentProgress, INSTALLMENTS_PAID_KEY, INSTALLMENT_KIND,
    INSTALLMENT_LIMIT_KEY, RENEWAL_BILLING_REASON,
};
pub use ledger::{LedgerDecision, LedgerEnvelope};
pub use projection::SubscriptionProjection;
pub use purchase::{
    AcceleratorPurchase, ElectiveCatalog, ElectivePurchase, PurchaseKind, PurchaseStatus,
    ELECTIVE_MODULE_KEY,
};
pub use rollover::{
    checkout_rollover_key, lifecycle_rollover_key, should_roll_to_organization_plan,
    RolloverContext, RolloverDecisionInput, ROLLOVER_CONTEXT_KEY,
};
pub use stripe_event::{StripeEvent, StripeEventData, StripeEventType, SUBSCRIPTION_EVENT_PREFIX};
pub use stripe_objects::{
    CheckoutMode, CheckoutSessionObject, Expandable, InvoiceObject, Metadata, SubscriptionObject,
};
pub use subscription_status::SubscriptionStatus;
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{sign_payload, SignatureHeader, StripeWebhookVerifier};
