//! Response bodies for the webhook endpoint.
//!
//! Stripe only looks at the status code; the bodies exist for operators
//! reading delivery logs in the Stripe dashboard.

use serde::{Deserialize, Serialize};

/// Body returned when a delivery was accepted or failed during processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAckResponse {
    pub received: bool,

    /// Set when the ledger already holds a finished attempt.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookAckResponse {
    /// Error tag for failures during dispatch.
    pub const PROCESSING_FAILED: &'static str = "processing_failed";

    pub fn received() -> Self {
        Self {
            received: true,
            duplicate: false,
            error: None,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            duplicate: true,
            ..Self::received()
        }
    }

    pub fn processing_failed() -> Self {
        Self {
            error: Some(Self::PROCESSING_FAILED.to_string()),
            ..Self::received()
        }
    }
}

/// Body returned when a delivery is rejected before any state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookErrorResponse {
    pub error: String,
}

impl WebhookErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
