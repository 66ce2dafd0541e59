//! PostgreSQL implementation of SubscriptionRepository.
//!
//! Rows are keyed by `stripe_subscription_id`; every upsert replaces the
//! whole row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::billing::{Metadata, SubscriptionProjection, SubscriptionStatus};
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, UserId};
use crate::ports::SubscriptionRepository;

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    /// Creates a new PostgresSubscriptionRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription projection.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    stripe_subscription_id: String,
    user_id: String,
    stripe_customer_id: Option<String>,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
    metadata: Json<Metadata>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionProjection {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = parse_status(&row.status)?;

        Ok(SubscriptionProjection {
            subscription_id: SubscriptionId::new(row.stripe_subscription_id).map_err(|e| {
                DomainError::database(format!("Invalid subscription id: {}", e))
            })?,
            user_id: UserId::new(row.user_id)
                .map_err(|e| DomainError::database(format!("Invalid user_id: {}", e)))?,
            customer_id: row.stripe_customer_id,
            status,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            metadata: row.metadata.0,
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn parse_status(s: &str) -> Result<SubscriptionStatus, DomainError> {
    SubscriptionStatus::parse(s)
        .ok_or_else(|| DomainError::database(format!("Invalid status value: {}", s)))
}

const SELECT_COLUMNS: &str = r#"
    SELECT stripe_subscription_id, user_id, stripe_customer_id, status,
           current_period_end, metadata, updated_at
    FROM subscriptions
"#;

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn upsert(&self, projection: &SubscriptionProjection) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                stripe_subscription_id, user_id, stripe_customer_id, status,
                current_period_end, metadata, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (stripe_subscription_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(projection.subscription_id.as_str())
        .bind(projection.user_id.as_str())
        .bind(&projection.customer_id)
        .bind(projection.status.as_str())
        .bind(projection.current_period_end.map(|ts| *ts.as_datetime()))
        .bind(Json(&projection.metadata))
        .bind(projection.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert subscription: {}", e)))?;

        Ok(())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Option<SubscriptionProjection>, DomainError> {
        let sql = format!("{} WHERE stripe_subscription_id = $1", SELECT_COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(subscription_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find subscription: {}", e)))?;

        row.map(SubscriptionProjection::try_from).transpose()
    }

    async fn find_active_or_trialing_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionProjection>, DomainError> {
        let sql = format!(
            "{} WHERE user_id = $1 AND status IN ('active', 'trialing') \
             ORDER BY updated_at DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find subscription: {}", e)))?;

        row.map(SubscriptionProjection::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_works_for_all_stored_values() {
        for status in [
            SubscriptionStatus::Trialing,
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Incomplete,
            SubscriptionStatus::IncompleteExpired,
        ] {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn parse_status_rejects_unknown_values() {
        assert!(parse_status("paused").is_err());
        assert!(parse_status("").is_err());
    }

    #[test]
    fn row_converts_to_projection() {
        let row = SubscriptionRow {
            stripe_subscription_id: "sub_1".to_string(),
            user_id: "user-1".to_string(),
            stripe_customer_id: Some("cus_1".to_string()),
            status: "past_due".to_string(),
            current_period_end: None,
            metadata: Json(Metadata::from([("k".to_string(), "v".to_string())])),
            updated_at: Utc::now(),
        };

        let projection = SubscriptionProjection::try_from(row).unwrap();

        assert_eq!(projection.subscription_id.as_str(), "sub_1");
        assert_eq!(projection.status, SubscriptionStatus::PastDue);
        assert_eq!(projection.metadata.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn row_with_blank_user_is_rejected() {
        let row = SubscriptionRow {
            stripe_subscription_id: "sub_1".to_string(),
            user_id: String::new(),
            stripe_customer_id: None,
            status: "active".to_string(),
            current_period_end: None,
            metadata: Json(Metadata::new()),
            updated_at: Utc::now(),
        };

        assert!(SubscriptionProjection::try_from(row).is_err());
    }
}
