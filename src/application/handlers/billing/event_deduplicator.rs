//! EventDeduplicator - the ledger gate in front of webhook dispatch.
//!
//! Every delivery first tries to insert a ledger row for its event id. Only
//! the first insert wins; later deliveries inspect the stored row to decide
//! whether the earlier attempt finished.

use std::sync::Arc;

use crate::domain::billing::{LedgerDecision, StripeEvent};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{LedgerEntry, SaveResult, WebhookLedger};

/// Decides whether a Stripe event should be (re)processed.
pub struct EventDeduplicator {
    ledger: Arc<dyn WebhookLedger>,
}

impl EventDeduplicator {
    pub fn new(ledger: Arc<dyn WebhookLedger>) -> Self {
        Self { ledger }
    }

    /// Records the delivery and classifies it.
    ///
    /// Database failures other than the uniqueness conflict propagate; the
    /// caller must then answer 500 without dispatching.
    pub async fn check(&self, event: &StripeEvent) -> Result<LedgerDecision, DomainError> {
        let entry = LedgerEntry::received(event, Timestamp::now())?;

        match self.ledger.insert(&entry).await? {
            SaveResult::Inserted => Ok(LedgerDecision::FirstDelivery),
            SaveResult::AlreadyExists => {
                let decision = match self.ledger.find_payload(&event.id).await? {
                    Some(payload) => LedgerDecision::from_stored(&payload),
                    // Lost between the conflict and the read; let the retry run.
                    None => LedgerDecision::RetryUnprocessed,
                };

                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    ?decision,
                    "Webhook event already in ledger"
                );

                Ok(decision)
            }
        }
    }

    /// True when the event should be dispatched.
    pub async fn should_process(&self, event: &StripeEvent) -> Result<bool, DomainError> {
        Ok(self.check(event).await?.should_process())
    }

    pub async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        self.ledger.mark_processed(event_id, Timestamp::now()).await
    }

    /// Annotates the failure. Errors are logged, never returned, so they
    /// cannot mask the dispatch error being reported.
    pub async fn mark_failed(&self, event_id: &str, error: &str) {
        if let Err(e) = self
            .ledger
            .mark_failed(event_id, Timestamp::now(), error)
            .await
        {
            tracing::error!(
                event_id = %event_id,
                error = %e,
                "Failed to record webhook failure in ledger"
            );
        }
    }
}
