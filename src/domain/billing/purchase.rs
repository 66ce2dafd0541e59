//! One-time purchase records written from completed payment checkouts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::stripe_objects::{CheckoutSessionObject, Metadata};
use crate::domain::foundation::{Timestamp, UserId};

/// Checkout metadata key naming the elective module bought.
pub const ELECTIVE_MODULE_KEY: &str = "module_slug";

/// Product family named by `metadata.kind` on a payment checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseKind {
    Accelerator,
    Elective,
}

impl PurchaseKind {
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        match metadata.get("kind").map(|k| k.trim()) {
            Some("accelerator") => Some(Self::Accelerator),
            Some("elective") => Some(Self::Elective),
            _ => None,
        }
    }
}

/// Purchase status derived from the checkout's payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Active,
    Pending,
}

impl PurchaseStatus {
    pub fn from_checkout(session: &CheckoutSessionObject) -> Self {
        if session.is_paid() {
            Self::Active
        } else {
            Self::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

fn flag(metadata: &Metadata, key: &str) -> bool {
    matches!(
        metadata.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1") | Some("yes")
    )
}

/// Accelerator bundle purchase, keyed by checkout session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorPurchase {
    pub checkout_session_id: String,
    pub user_id: UserId,
    pub customer_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub status: PurchaseStatus,
    pub coaching_included: bool,
    pub purchased_at: Timestamp,
}

impl AcceleratorPurchase {
    pub fn from_checkout(session: &CheckoutSessionObject, user_id: UserId) -> Self {
        Self {
            checkout_session_id: session.id.clone(),
            user_id,
            customer_id: session.customer_id().map(str::to_string),
            payment_intent_id: session.payment_intent_id().map(str::to_string),
            status: PurchaseStatus::from_checkout(session),
            coaching_included: flag(&session.metadata, "coaching_included"),
            purchased_at: Timestamp::now(),
        }
    }
}

/// Elective module purchase, keyed by (user id, module slug).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectivePurchase {
    pub user_id: UserId,
    pub module_slug: String,
    pub checkout_session_id: String,
    pub customer_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub status: PurchaseStatus,
    pub purchased_at: Timestamp,
}

impl ElectivePurchase {
    /// Module slug named on a checkout, if any.
    pub fn requested_module(metadata: &Metadata) -> Option<&str> {
        metadata
            .get(ELECTIVE_MODULE_KEY)
            .map(|slug| slug.trim())
            .filter(|slug| !slug.is_empty())
    }

    pub fn from_checkout(
        session: &CheckoutSessionObject,
        user_id: UserId,
        module_slug: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            module_slug: module_slug.into(),
            checkout_session_id: session.id.clone(),
            customer_id: session.customer_id().map(str::to_string),
            payment_intent_id: session.payment_intent_id().map(str::to_string),
            status: PurchaseStatus::from_checkout(session),
            purchased_at: Timestamp::now(),
        }
    }
}

/// Allow-list of elective module slugs that may be purchased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectiveCatalog {
    slugs: BTreeSet<String>,
}

impl ElectiveCatalog {
    pub fn new<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            slugs: slugs
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.slugs.contains(slug.trim())
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}
