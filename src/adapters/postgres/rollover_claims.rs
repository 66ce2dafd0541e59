//! PostgreSQL implementation of RolloverClaims.
//!
//! A claim is a row in `rollover_claims`. Taking it is a single upsert that
//! only overwrites an existing row once its lease has expired, so exactly
//! one of several concurrent callers sees a row affected. Each claim writes
//! a fresh token and release deletes only the row carrying it.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::ports::{RolloverClaim, RolloverClaims};

/// PostgreSQL implementation of the RolloverClaims port.
pub struct PostgresRolloverClaims {
    pool: PgPool,
}

impl PostgresRolloverClaims {
    /// Creates a new PostgresRolloverClaims with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RolloverClaims for PostgresRolloverClaims {
    async fn try_claim(
        &self,
        user_id: &UserId,
        lease: Duration,
    ) -> Result<Option<RolloverClaim>, DomainError> {
        let now = Timestamp::now();
        let claim = RolloverClaim::new(user_id.clone(), now, lease);

        let result = sqlx::query(
            r#"
            INSERT INTO rollover_claims (user_id, claim_token, claimed_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                claim_token = EXCLUDED.claim_token,
                claimed_at = EXCLUDED.claimed_at,
                expires_at = EXCLUDED.expires_at
            WHERE rollover_claims.expires_at <= EXCLUDED.claimed_at
            "#,
        )
        .bind(user_id.as_str())
        .bind(claim.token)
        .bind(now.as_datetime())
        .bind(claim.expires_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to claim rollover: {}", e)))?;

        Ok((result.rows_affected() > 0).then_some(claim))
    }

    async fn release(&self, claim: &RolloverClaim) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM rollover_claims WHERE user_id = $1 AND claim_token = $2")
            .bind(claim.user_id.as_str())
            .bind(claim.token)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to release rollover claim: {}", e)))?;

        Ok(())
    }
}
