//! Webhook ledger envelope and deduplication decision.
//!
//! The ledger stores one row per Stripe event id. Its `payload` column holds
//! a [`LedgerEnvelope`]: the raw event plus processing state. Rows written
//! before the envelope existed hold the bare event and have no `processed`
//! field at all.

use serde::{Deserialize, Serialize};

use super::stripe_event::StripeEvent;
use crate::domain::foundation::Timestamp;

/// JSON document stored in the ledger's payload column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEnvelope {
    pub processed: bool,
    pub received_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub event: serde_json::Value,
}

impl LedgerEnvelope {
    /// Fresh envelope for an event seen for the first time.
    pub fn received(event: &StripeEvent, received_at: Timestamp) -> Result<Self, serde_json::Error> {
        Ok(Self {
            processed: false,
            received_at,
            processed_at: None,
            failed_at: None,
            error: None,
            event: serde_json::to_value(event)?,
        })
    }

    pub fn mark_processed(&mut self, at: Timestamp) {
        self.processed = true;
        self.processed_at = Some(at);
    }

    /// Records a failed attempt. The entry stays unprocessed.
    pub fn mark_failed(&mut self, at: Timestamp, error: impl Into<String>) {
        self.failed_at = Some(at);
        self.error = Some(error.into());
    }
}

/// Outcome of the deduplication gate for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerDecision {
    /// The insert created the row.
    FirstDelivery,
    /// A row exists but has not been marked processed (failed or in flight).
    RetryUnprocessed,
    /// A row exists and was processed.
    AlreadyProcessed,
    /// A row exists in the pre-envelope format.
    PreLedgerFormat,
}

impl LedgerDecision {
    /// Classifies an existing row's payload after an insert conflict.
    pub fn from_stored(payload: &serde_json::Value) -> Self {
        match payload.get("processed") {
            None => Self::PreLedgerFormat,
            Some(serde_json::Value::Bool(false)) => Self::RetryUnprocessed,
            Some(serde_json::Value::Bool(true)) => Self::AlreadyProcessed,
            // Not something this service wrote; leave it alone.
            Some(_) => Self::PreLedgerFormat,
        }
    }

    pub fn should_process(&self) -> bool {
        matches!(self, Self::FirstDelivery | Self::RetryUnprocessed)
    }
}
