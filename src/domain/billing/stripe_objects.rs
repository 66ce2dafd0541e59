//! Typed views over the Stripe objects carried in webhook payloads.
//!
//! Stripe may send a referenced object either as its id or, when expanded,
//! as the full object. [`Expandable`] accepts both.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata map as Stripe stores it (string keys and values).
pub type Metadata = HashMap<String, String>;

/// A reference that is either a bare id or an expanded object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

fn expandable_id(value: &Option<Expandable>) -> Option<&str> {
    value.as_ref().map(Expandable::id).filter(|id| !id.is_empty())
}

// ════════════════════════════════════════════════════════════════════════════════
// Checkout Session
// ════════════════════════════════════════════════════════════════════════════════

/// Checkout session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    Payment,
    Subscription,
    Setup,
    #[serde(other)]
    Unknown,
}

/// `checkout.session` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSessionObject {
    pub id: String,

    pub mode: CheckoutMode,

    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,

    #[serde(default)]
    pub customer: Option<Expandable>,

    #[serde(default)]
    pub subscription: Option<Expandable>,

    #[serde(default)]
    pub payment_intent: Option<Expandable>,

    #[serde(default)]
    pub client_reference_id: Option<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl CheckoutSessionObject {
    pub fn customer_id(&self) -> Option<&str> {
        expandable_id(&self.customer)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        expandable_id(&self.subscription)
    }

    pub fn payment_intent_id(&self) -> Option<&str> {
        expandable_id(&self.payment_intent)
    }

    /// Owning user: `metadata.user_id`, else `client_reference_id`.
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get("user_id")
            .map(String::as_str)
            .or(self.client_reference_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    /// True when Stripe reports that no further payment is owed.
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid") | Some("no_payment_required")
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription
// ════════════════════════════════════════════════════════════════════════════════

/// `subscription` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionObject {
    pub id: String,

    #[serde(default)]
    pub customer: Option<Expandable>,

    pub status: String,

    /// Present at the top level on API versions before 2025-03-31.
    #[serde(default)]
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub current_period_end: Option<i64>,
}

impl SubscriptionObject {
    pub fn customer_id(&self) -> Option<&str> {
        expandable_id(&self.customer)
    }

    /// Period end from the subscription, falling back to its first item.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .iter()
                .find_map(|item| item.current_period_end)
        })
    }

    pub fn metadata_user_id(&self) -> Option<&str> {
        self.metadata
            .get("user_id")
            .map(String::as_str)
            .filter(|id| !id.trim().is_empty())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Invoice
// ════════════════════════════════════════════════════════════════════════════════

/// `invoice` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvoiceObject {
    pub id: String,

    /// e.g. `subscription_create`, `subscription_cycle`, `manual`.
    #[serde(default)]
    pub billing_reason: Option<String>,

    #[serde(default)]
    pub customer: Option<Expandable>,

    /// Legacy parent-subscription link.
    #[serde(default)]
    pub subscription: Option<Expandable>,

    /// Parent link on newer API versions.
    #[serde(default)]
    pub parent: Option<InvoiceParent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvoiceParent {
    #[serde(default)]
    pub subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvoiceSubscriptionDetails {
    #[serde(default)]
    pub subscription: Option<Expandable>,
}

impl InvoiceObject {
    /// Parent subscription id from either the legacy or the current shape.
    pub fn subscription_id(&self) -> Option<&str> {
        expandable_id(&self.subscription).or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .and_then(|d| expandable_id(&d.subscription))
        })
    }
}
