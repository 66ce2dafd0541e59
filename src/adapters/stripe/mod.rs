//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port for Stripe integration:
//! - Subscription creation with idempotency keys
//! - Subscription retrieval
//! - Metadata and cancel-at-period-end updates
//!
//! Webhook signature verification lives in the domain
//! (`domain::billing::StripeWebhookVerifier`) since it needs no I/O.
//!
//! # Security
//!
//! - The secret key is held in `secrecy::SecretString` and never logged

mod mock_billing_provider;
mod stripe_adapter;

pub use mock_billing_provider::{MethodCall, MockBillingProvider};
pub use stripe_adapter::{StripeBillingAdapter, StripeConfig};
