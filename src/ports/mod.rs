//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `WebhookLedger` - Stripe event deduplication ledger
//! - `SubscriptionRepository` - Local subscription projections
//! - `PurchaseRepository` - One-time purchase records
//! - `RolloverClaims` - Per-user lease around rollover creation
//!
//! ## External Service Ports
//!
//! - `BillingProvider` - Stripe subscription API

mod billing_provider;
mod purchase_repository;
mod rollover_claims;
mod subscription_repository;
mod webhook_ledger;

pub use billing_provider::{
    BillingProvider, CreateSubscriptionRequest, PaymentError, PaymentErrorCode,
    UpdateSubscriptionRequest,
};
pub use purchase_repository::PurchaseRepository;
pub use rollover_claims::{
    lease_expiry, RolloverClaim, RolloverClaims, DEFAULT_CLAIM_LEASE, MAX_CLAIM_LEASE,
};
pub use subscription_repository::SubscriptionRepository;
pub use webhook_ledger::{LedgerEntry, SaveResult, WebhookLedger};
