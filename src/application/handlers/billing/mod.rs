//! Billing handlers.
//!
//! Stripe webhook processing:
//!
//! - `handle_stripe_webhook` - verification, dispatch and ledger finalization
//! - `event_deduplicator` - ledger gate in front of dispatch
//! - `projection_writer` - local subscription mirror writes
//! - `rollover_initiator` - guarded organization plan creation

mod event_deduplicator;
mod handle_stripe_webhook;
mod projection_writer;
mod rollover_initiator;

pub use event_deduplicator::EventDeduplicator;
pub use handle_stripe_webhook::{
    HandleStripeWebhookCommand, HandleStripeWebhookHandler, HandleStripeWebhookResult,
    WebhookAction, WebhookPorts, WebhookSettings,
};
pub use projection_writer::ProjectionWriter;
pub use rollover_initiator::{RolloverInitiator, RolloverOutcome, RolloverRequest};
