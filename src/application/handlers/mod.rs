//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod billing;

pub use billing::{
    EventDeduplicator, HandleStripeWebhookCommand, HandleStripeWebhookHandler,
    HandleStripeWebhookResult, ProjectionWriter, RolloverInitiator, RolloverOutcome,
    RolloverRequest, WebhookAction, WebhookPorts, WebhookSettings,
};
