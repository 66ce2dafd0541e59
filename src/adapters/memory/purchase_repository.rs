//! In-memory purchase records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::FailNext;
use crate::domain::billing::{AcceleratorPurchase, ElectivePurchase};
use crate::domain::foundation::DomainError;
use crate::ports::PurchaseRepository;

#[derive(Debug, Default)]
struct Purchases {
    accelerators: HashMap<String, AcceleratorPurchase>,
    electives: HashMap<(String, String), ElectivePurchase>,
    writes: usize,
}

/// In-memory purchases with the same keys as the Postgres tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPurchaseRepository {
    inner: Arc<RwLock<Purchases>>,
    fail_writes: FailNext,
}

impl InMemoryPurchaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn accelerator(&self, checkout_session_id: &str) -> Option<AcceleratorPurchase> {
        self.inner
            .read()
            .await
            .accelerators
            .get(checkout_session_id)
            .cloned()
    }

    pub async fn elective(&self, user_id: &str, module_slug: &str) -> Option<ElectivePurchase> {
        self.inner
            .read()
            .await
            .electives
            .get(&(user_id.to_string(), module_slug.to_string()))
            .cloned()
    }

    pub async fn accelerator_count(&self) -> usize {
        self.inner.read().await.accelerators.len()
    }

    pub async fn elective_count(&self) -> usize {
        self.inner.read().await.electives.len()
    }

    /// Number of successful upserts of either kind.
    pub async fn write_count(&self) -> usize {
        self.inner.read().await.writes
    }

    pub fn fail_writes(&self) -> &FailNext {
        &self.fail_writes
    }
}

#[async_trait]
impl PurchaseRepository for InMemoryPurchaseRepository {
    async fn upsert_accelerator(&self, purchase: &AcceleratorPurchase) -> Result<(), DomainError> {
        if self.fail_writes.take() {
            return Err(DomainError::database("injected purchase write failure"));
        }

        let mut inner = self.inner.write().await;
        inner
            .accelerators
            .insert(purchase.checkout_session_id.clone(), purchase.clone());
        inner.writes += 1;
        Ok(())
    }

    async fn upsert_elective(&self, purchase: &ElectivePurchase) -> Result<(), DomainError> {
        if self.fail_writes.take() {
            return Err(DomainError::database("injected purchase write failure"));
        }

        let mut inner = self.inner.write().await;
        inner.electives.insert(
            (
                purchase.user_id.as_str().to_string(),
                purchase.module_slug.clone(),
            ),
            purchase.clone(),
        );
        inner.writes += 1;
        Ok(())
    }
}
