//! PurchaseRepository port - one-time purchase records.

use async_trait::async_trait;

use crate::domain::billing::{AcceleratorPurchase, ElectivePurchase};
use crate::domain::foundation::DomainError;

/// Port for one-time purchase persistence. Both writes are idempotent upserts.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Upsert keyed by checkout session id.
    async fn upsert_accelerator(&self, purchase: &AcceleratorPurchase) -> Result<(), DomainError>;

    /// Upsert keyed by (user id, module slug).
    async fn upsert_elective(&self, purchase: &ElectivePurchase) -> Result<(), DomainError>;
}
