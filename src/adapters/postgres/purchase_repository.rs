//! PostgreSQL implementation of PurchaseRepository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{AcceleratorPurchase, ElectivePurchase};
use crate::domain::foundation::DomainError;
use crate::ports::PurchaseRepository;

/// PostgreSQL implementation of the PurchaseRepository port.
///
/// Accelerator rows are unique on the checkout session id, elective rows
/// on (user id, module slug). A retried webhook refreshes the existing row;
/// the generated `id` and `purchased_at` of the first write are kept.
pub struct PostgresPurchaseRepository {
    pool: PgPool,
}

impl PostgresPurchaseRepository {
    /// Creates a new PostgresPurchaseRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseRepository for PostgresPurchaseRepository {
    async fn upsert_accelerator(&self, purchase: &AcceleratorPurchase) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO accelerator_purchases (
                id, stripe_checkout_session_id, user_id, stripe_customer_id,
                stripe_payment_intent_id, status, coaching_included, purchased_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (stripe_checkout_session_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                stripe_payment_intent_id = EXCLUDED.stripe_payment_intent_id,
                status = EXCLUDED.status,
                coaching_included = EXCLUDED.coaching_included,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&purchase.checkout_session_id)
        .bind(purchase.user_id.as_str())
        .bind(&purchase.customer_id)
        .bind(&purchase.payment_intent_id)
        .bind(purchase.status.as_str())
        .bind(purchase.coaching_included)
        .bind(purchase.purchased_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to upsert accelerator purchase: {}", e))
                .with_detail("checkout_session_id", purchase.checkout_session_id.clone())
        })?;

        Ok(())
    }

    async fn upsert_elective(&self, purchase: &ElectivePurchase) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO elective_purchases (
                id, user_id, module_slug, stripe_checkout_session_id, stripe_customer_id,
                stripe_payment_intent_id, status, purchased_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (user_id, module_slug) DO UPDATE SET
                stripe_checkout_session_id = EXCLUDED.stripe_checkout_session_id,
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                stripe_payment_intent_id = EXCLUDED.stripe_payment_intent_id,
                status = EXCLUDED.status,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(purchase.user_id.as_str())
        .bind(&purchase.module_slug)
        .bind(&purchase.checkout_session_id)
        .bind(&purchase.customer_id)
        .bind(&purchase.payment_intent_id)
        .bind(purchase.status.as_str())
        .bind(purchase.purchased_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to upsert elective purchase: {}", e))
                .with_detail("module_slug", purchase.module_slug.clone())
        })?;

        Ok(())
    }
}
