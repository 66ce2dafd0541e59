//! In-memory rollover claims.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::ports::{RolloverClaim, RolloverClaims};

/// In-memory claims: user id to the current holder's token and expiry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRolloverClaims {
    claims: Arc<Mutex<HashMap<String, (Uuid, Timestamp)>>>,
}

impl InMemoryRolloverClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates another holder owning the claim until `expires_at`.
    ///
    /// The returned claim releases it.
    pub async fn hold(&self, user_id: &UserId, expires_at: Timestamp) -> RolloverClaim {
        let claim = RolloverClaim {
            user_id: user_id.clone(),
            token: Uuid::new_v4(),
            expires_at,
        };
        self.claims
            .lock()
            .await
            .insert(user_id.as_str().to_string(), (claim.token, expires_at));
        claim
    }

    /// True when an unexpired claim exists for the user.
    pub async fn is_claimed(&self, user_id: &str) -> bool {
        let now = Timestamp::now();
        self.claims
            .lock()
            .await
            .get(user_id)
            .map_or(false, |(_, expires_at)| now.is_before(expires_at))
    }
}

#[async_trait]
impl RolloverClaims for InMemoryRolloverClaims {
    async fn try_claim(
        &self,
        user_id: &UserId,
        lease: Duration,
    ) -> Result<Option<RolloverClaim>, DomainError> {
        let now = Timestamp::now();
        let mut claims = self.claims.lock().await;

        if let Some((_, expires_at)) = claims.get(user_id.as_str()) {
            if now.is_before(expires_at) {
                return Ok(None);
            }
        }

        let claim = RolloverClaim::new(user_id.clone(), now, lease);
        claims.insert(
            user_id.as_str().to_string(),
            (claim.token, claim.expires_at),
        );
        Ok(Some(claim))
    }

    async fn release(&self, claim: &RolloverClaim) -> Result<(), DomainError> {
        let mut claims = self.claims.lock().await;
        if matches!(claims.get(claim.user_id.as_str()), Some((token, _)) if *token == claim.token) {
            claims.remove(claim.user_id.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::DEFAULT_CLAIM_LEASE;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_released() {
        let claims = InMemoryRolloverClaims::new();

        let held = claims
            .try_claim(&user("u1"), DEFAULT_CLAIM_LEASE)
            .await
            .unwrap()
            .expect("first claim succeeds");
        assert!(claims
            .try_claim(&user("u1"), DEFAULT_CLAIM_LEASE)
            .await
            .unwrap()
            .is_none());

        claims.release(&held).await.unwrap();
        assert!(claims
            .try_claim(&user("u1"), DEFAULT_CLAIM_LEASE)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn expired_claim_can_be_taken_over() {
        let claims = InMemoryRolloverClaims::new();
        claims.hold(&user("u1"), Timestamp::now().plus_secs(-1)).await;

        let taken = claims
            .try_claim(&user("u1"), DEFAULT_CLAIM_LEASE)
            .await
            .unwrap();
        assert!(taken.is_some());
        assert!(claims.is_claimed("u1").await);
    }

    #[tokio::test]
    async fn lapsed_holder_cannot_release_newer_claim() {
        let claims = InMemoryRolloverClaims::new();
        let stale = claims.hold(&user("u1"), Timestamp::now().plus_secs(-1)).await;

        let current = claims
            .try_claim(&user("u1"), DEFAULT_CLAIM_LEASE)
            .await
            .unwrap()
            .expect("expired claim is taken over");

        claims.release(&stale).await.unwrap();
        assert!(claims.is_claimed("u1").await);

        claims.release(&current).await.unwrap();
        assert!(!claims.is_claimed("u1").await);
    }

    #[tokio::test]
    async fn claims_are_per_user() {
        let claims = InMemoryRolloverClaims::new();

        assert!(claims
            .try_claim(&user("u1"), DEFAULT_CLAIM_LEASE)
            .await
            .unwrap()
            .is_some());
        assert!(claims
            .try_claim(&user("u2"), DEFAULT_CLAIM_LEASE)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn releasing_absent_claim_is_ok() {
        let claims = InMemoryRolloverClaims::new();
        let claim = RolloverClaim::new(user("u1"), Timestamp::now(), DEFAULT_CLAIM_LEASE);
        assert!(claims.release(&claim).await.is_ok());
    }
}
