//! Stripe webhook event envelope.
//!
//! Only the fields the reconciler reads are captured; the polymorphic
//! `data.object` stays as raw JSON until a handler asks for a typed view.

use serde::{Deserialize, Serialize};

/// Prefix shared by every subscription lifecycle event.
pub const SUBSCRIPTION_EVENT_PREFIX: &str = "customer.subscription.";

/// Stripe webhook event (simplified).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    #[serde(default)]
    pub created: i64,

    /// Object containing event-specific data.
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,

    /// API version used to render this event. Null for some account events.
    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (only for update events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl StripeEvent {
    /// Returns true if this is a live mode event.
    pub fn is_live(&self) -> bool {
        self.livemode
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data.object)
    }

    /// Parse the event type into a known enum variant.
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::parse(&self.event_type)
    }
}

/// Event types the router dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    /// `checkout.session.completed`
    CheckoutSessionCompleted,
    /// `invoice.paid`
    InvoicePaid,
    /// `customer.subscription.created`
    SubscriptionCreated,
    /// `customer.subscription.updated`
    SubscriptionUpdated,
    /// `customer.subscription.deleted`
    SubscriptionDeleted,
    /// Any other `customer.subscription.*` event (paused, resumed, trial_will_end...).
    SubscriptionOther,
    /// Unknown or unhandled event type.
    Unknown,
}

impl StripeEventType {
    /// Parse event type from string.
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.paid" => Self::InvoicePaid,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            other if other.starts_with(SUBSCRIPTION_EVENT_PREFIX) => Self::SubscriptionOther,
            _ => Self::Unknown,
        }
    }

    /// True for every `customer.subscription.*` event.
    pub fn is_subscription_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionCreated
                | Self::SubscriptionUpdated
                | Self::SubscriptionDeleted
                | Self::SubscriptionOther
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_event_types() {
        assert_eq!(
            StripeEventType::parse("checkout.session.completed"),
            StripeEventType::CheckoutSessionCompleted
        );
        assert_eq!(StripeEventType::parse("invoice.paid"), StripeEventType::InvoicePaid);
        assert_eq!(
            StripeEventType::parse("customer.subscription.deleted"),
            StripeEventType::SubscriptionDeleted
        );
    }

    #[test]
    fn subscription_prefix_matches_unlisted_lifecycle_events() {
        let parsed = StripeEventType::parse("customer.subscription.trial_will_end");
        assert_eq!(parsed, StripeEventType::SubscriptionOther);
        assert!(parsed.is_subscription_lifecycle());
    }

    #[test]
    fn unrelated_types_are_unknown() {
        assert_eq!(
            StripeEventType::parse("invoice.payment_failed"),
            StripeEventType::Unknown
        );
        assert_eq!(StripeEventType::parse("customer.created"), StripeEventType::Unknown);
        assert!(!StripeEventType::Unknown.is_subscription_lifecycle());
    }

    #[test]
    fn deserializes_minimal_envelope() {
        let event: StripeEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "type": "invoice.paid",
            "data": { "object": { "id": "in_1" } },
            "api_version": null
        }))
        .unwrap();

        assert_eq!(event.id, "evt_1");
        assert!(!event.is_live());
        assert!(event.api_version.is_none());
        assert_eq!(event.parsed_type(), StripeEventType::InvoicePaid);
    }

    #[test]
    fn deserialize_object_reads_typed_view() {
        #[derive(Deserialize)]
        struct IdOnly {
            id: String,
        }

        let event: StripeEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "type": "invoice.paid",
            "data": { "object": { "id": "in_42", "extra": true } }
        }))
        .unwrap();

        let obj: IdOnly = event.deserialize_object().unwrap();
        assert_eq!(obj.id, "in_42");
    }
}
