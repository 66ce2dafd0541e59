//! Local subscription status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status values the subscription projection may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Incomplete,
    IncompleteExpired,
}

impl SubscriptionStatus {
    /// Normalizes a Stripe status string.
    ///
    /// Anything outside the fixed set (`paused`, `unpaid`, typos, future
    /// values) becomes `Trialing`. This never fails.
    pub fn to_status(raw: &str) -> Self {
        match raw.trim() {
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            _ => Self::Trialing,
        }
    }

    /// Strict parse used when reading rows back from storage.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "trialing" => Some(Self::Trialing),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            "incomplete" => Some(Self::Incomplete),
            "incomplete_expired" => Some(Self::IncompleteExpired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
        }
    }

    /// Statuses that block a second follow-on subscription.
    pub fn is_active_or_trialing(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }

    /// The subscription has ended and will not bill again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::IncompleteExpired)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
