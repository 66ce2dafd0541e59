//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresWebhookLedger` - Stripe event ledger (`stripe_webhook_events`)
//! - `PostgresSubscriptionRepository` - Subscription projections
//! - `PostgresPurchaseRepository` - Accelerator and elective purchases
//! - `PostgresRolloverClaims` - Per-user rollover leases
//!
//! Schema lives in `migrations/`.

mod purchase_repository;
mod rollover_claims;
mod subscription_repository;
mod webhook_ledger;

pub use purchase_repository::PostgresPurchaseRepository;
pub use rollover_claims::PostgresRolloverClaims;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use webhook_ledger::PostgresWebhookLedger;
