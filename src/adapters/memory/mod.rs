//! In-memory adapters for tests and local development.
//!
//! Each adapter is `Clone` and shares its state, so a test can hand one
//! copy to the handler and keep another for assertions. Writes can be made
//! to fail on demand with [`FailNext`].

mod purchase_repository;
mod rollover_claims;
mod subscription_repository;
mod webhook_ledger;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub use purchase_repository::InMemoryPurchaseRepository;
pub use rollover_claims::InMemoryRolloverClaims;
pub use subscription_repository::InMemorySubscriptionRepository;
pub use webhook_ledger::InMemoryWebhookLedger;

/// Shared counter of upcoming calls that should fail.
#[derive(Debug, Clone, Default)]
pub struct FailNext(Arc<AtomicUsize>);

impl FailNext {
    /// Makes the next `calls` guarded calls fail.
    pub fn arm(&self, calls: usize) {
        self.0.store(calls, Ordering::SeqCst);
    }

    /// Consumes one pending failure, if any.
    pub(crate) fn take(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}
