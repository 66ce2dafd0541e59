//! PostgreSQL implementation of WebhookLedger.
//!
//! One row per Stripe event id in `stripe_webhook_events`. The primary key
//! is the deduplication gate; processing state lives inside the JSONB
//! payload and is patched in place with `||`.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{LedgerEntry, SaveResult, WebhookLedger};

/// PostgreSQL implementation of the WebhookLedger port.
pub struct PostgresWebhookLedger {
    pool: PgPool,
}

impl PostgresWebhookLedger {
    /// Creates a new PostgresWebhookLedger with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookLedger for PostgresWebhookLedger {
    async fn insert(&self, entry: &LedgerEntry) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO stripe_webhook_events (id, type, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&entry.event_id)
        .bind(&entry.event_type)
        .bind(Json(&entry.envelope))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert webhook event: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn find_payload(
        &self,
        event_id: &str,
    ) -> Result<Option<serde_json::Value>, DomainError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT payload FROM stripe_webhook_events WHERE id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::database(format!("Failed to load webhook event: {}", e))
                })?;

        Ok(row.map(|(payload,)| payload))
    }

    async fn mark_processed(&self, event_id: &str, at: Timestamp) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE stripe_webhook_events
            SET payload = payload || jsonb_build_object(
                'processed', true,
                'processed_at', $2::text
            )
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to mark webhook event processed: {}", e))
        })?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        event_id: &str,
        at: Timestamp,
        error: &str,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE stripe_webhook_events
            SET payload = payload || jsonb_build_object(
                'failed_at', $2::text,
                'error', $3::text
            )
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .bind(at.to_rfc3339())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to mark webhook event failed: {}", e))
        })?;

        Ok(())
    }
}
