//! In-memory webhook ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::FailNext;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{LedgerEntry, SaveResult, WebhookLedger};

#[derive(Debug, Clone)]
struct StoredEvent {
    event_type: String,
    payload: Value,
}

/// In-memory ledger keyed by event id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookLedger {
    rows: Arc<RwLock<HashMap<String, StoredEvent>>>,
    fail_inserts: FailNext,
    fail_marks: FailNext,
}

impl InMemoryWebhookLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a row verbatim, e.g. one written before the envelope format.
    pub async fn seed(&self, event_id: &str, event_type: &str, payload: Value) {
        self.rows.write().await.insert(
            event_id.to_string(),
            StoredEvent {
                event_type: event_type.to_string(),
                payload,
            },
        );
    }

    /// Stored payload for an event id.
    pub async fn payload(&self, event_id: &str) -> Option<Value> {
        self.rows
            .read()
            .await
            .get(event_id)
            .map(|row| row.payload.clone())
    }

    pub async fn event_type(&self, event_id: &str) -> Option<String> {
        self.rows
            .read()
            .await
            .get(event_id)
            .map(|row| row.event_type.clone())
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Failure switch for `insert`.
    pub fn fail_inserts(&self) -> &FailNext {
        &self.fail_inserts
    }

    /// Failure switch for `mark_processed` and `mark_failed`.
    pub fn fail_marks(&self) -> &FailNext {
        &self.fail_marks
    }

    async fn patch(&self, event_id: &str, fields: Vec<(&str, Value)>) -> Result<(), DomainError> {
        if self.fail_marks.take() {
            return Err(DomainError::database("injected ledger update failure"));
        }

        let mut rows = self.rows.write().await;
        // Matches `UPDATE ... WHERE id = $1`: no row, nothing to do.
        if let Some(Value::Object(map)) = rows.get_mut(event_id).map(|row| &mut row.payload) {
            for (key, value) in fields {
                map.insert(key.to_string(), value);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookLedger for InMemoryWebhookLedger {
    async fn insert(&self, entry: &LedgerEntry) -> Result<SaveResult, DomainError> {
        if self.fail_inserts.take() {
            return Err(DomainError::database("injected ledger insert failure"));
        }

        let payload = serde_json::to_value(&entry.envelope)
            .map_err(|e| DomainError::database(format!("Failed to encode envelope: {}", e)))?;

        let mut rows = self.rows.write().await;
        if rows.contains_key(&entry.event_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        rows.insert(
            entry.event_id.clone(),
            StoredEvent {
                event_type: entry.event_type.clone(),
                payload,
            },
        );
        Ok(SaveResult::Inserted)
    }

    async fn find_payload(&self, event_id: &str) -> Result<Option<Value>, DomainError> {
        Ok(self.payload(event_id).await)
    }

    async fn mark_processed(&self, event_id: &str, at: Timestamp) -> Result<(), DomainError> {
        self.patch(
            event_id,
            vec![
                ("processed", Value::Bool(true)),
                ("processed_at", Value::String(at.to_rfc3339())),
            ],
        )
        .await
    }

    async fn mark_failed(
        &self,
        event_id: &str,
        at: Timestamp,
        error: &str,
    ) -> Result<(), DomainError> {
        self.patch(
            event_id,
            vec![
                ("failed_at", Value::String(at.to_rfc3339())),
                ("error", Value::String(error.to_string())),
            ],
        )
        .await
    }
}
