//! WebhookLedger port - durable record of every Stripe event delivery.
//!
//! The insert is the uniqueness gate: implementations must rely on a
//! primary key on the event id (`ON CONFLICT DO NOTHING`) so two concurrent
//! deliveries cannot both create the row.
//!
//! Stripe may deliver the same event more than once (timeouts, 5xx
//! responses, lost acknowledgements), so every downstream write must be
//! idempotent.

use async_trait::async_trait;

use crate::domain::billing::{LedgerEnvelope, StripeEvent};
use crate::domain::foundation::{DomainError, Timestamp};

/// Row inserted on first sight of an event.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Stripe event ID (evt_xxx format).
    pub event_id: String,

    /// Type of Stripe event (e.g., "invoice.paid").
    pub event_type: String,

    /// Envelope stored in the payload column.
    pub envelope: LedgerEnvelope,
}

impl LedgerEntry {
    /// Entry for an event received at `received_at`, not yet processed.
    pub fn received(event: &StripeEvent, received_at: Timestamp) -> Result<Self, DomainError> {
        let envelope = LedgerEnvelope::received(event, received_at).map_err(|e| {
            DomainError::new(
                crate::domain::foundation::ErrorCode::InternalError,
                format!("Failed to encode ledger envelope: {}", e),
            )
        })?;
        Ok(Self {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            envelope,
        })
    }
}

/// Result of attempting to insert a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Row was inserted (first time seeing this event).
    Inserted,
    /// Row already exists.
    AlreadyExists,
}

/// Port for the webhook event ledger.
#[async_trait]
pub trait WebhookLedger: Send + Sync {
    /// Inserts the entry unless a row for the event id exists.
    ///
    /// Uniqueness conflicts are reported as `SaveResult::AlreadyExists`;
    /// every other failure is an error.
    async fn insert(&self, entry: &LedgerEntry) -> Result<SaveResult, DomainError>;

    /// Raw payload stored for an event id, in whatever format it was written.
    async fn find_payload(&self, event_id: &str)
        -> Result<Option<serde_json::Value>, DomainError>;

    /// Sets `processed = true` and `processed_at`.
    async fn mark_processed(&self, event_id: &str, at: Timestamp) -> Result<(), DomainError>;

    /// Sets `failed_at` and `error`. `processed` stays false.
    async fn mark_failed(
        &self,
        event_id: &str,
        at: Timestamp,
        error: &str,
    ) -> Result<(), DomainError>;
}
