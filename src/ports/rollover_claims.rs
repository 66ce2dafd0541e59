//! RolloverClaims port - per-user lease around rollover creation.
//!
//! Two deliveries for the same user (an installment invoice and a lifecycle
//! update, say) can both pass the "no active subscription" check before
//! either projection lands. A claim makes the check-then-create section
//! exclusive per user. Leases expire so a crashed holder cannot block the
//! user forever.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, Timestamp, UserId};

/// How long a claim is honoured before another request may take it over.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(600);

/// Longest lease honoured; longer requests are clamped.
pub const MAX_CLAIM_LEASE: Duration = Duration::from_secs(24 * 60 * 60);

/// When a claim taken at `now` for `lease` expires.
pub fn lease_expiry(now: Timestamp, lease: Duration) -> Timestamp {
    // Clamped, so the cast cannot wrap.
    now.plus_secs(lease.min(MAX_CLAIM_LEASE).as_secs() as i64)
}

/// A claim held by one request. The token identifies the holder, so a
/// holder whose lease lapsed cannot release a claim taken over since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverClaim {
    pub user_id: UserId,
    pub token: Uuid,
    pub expires_at: Timestamp,
}

impl RolloverClaim {
    /// Fresh claim for `user_id` taken at `now`.
    pub fn new(user_id: UserId, now: Timestamp, lease: Duration) -> Self {
        Self {
            user_id,
            token: Uuid::new_v4(),
            expires_at: lease_expiry(now, lease),
        }
    }
}

/// Port for per-user rollover claims.
#[async_trait]
pub trait RolloverClaims: Send + Sync {
    /// Takes the claim for `user_id`.
    ///
    /// Returns `None` when another holder owns an unexpired claim.
    async fn try_claim(
        &self,
        user_id: &UserId,
        lease: Duration,
    ) -> Result<Option<RolloverClaim>, DomainError>;

    /// Releases `claim` if it is still the current one for its user.
    /// Releasing an absent or superseded claim is not an error.
    async fn release(&self, claim: &RolloverClaim) -> Result<(), DomainError>;
}
