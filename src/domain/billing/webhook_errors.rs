//! Webhook error types for Stripe webhook handling.
//!
//! Verification failures are rejected with 400 before any state changes.
//! Failures during dispatch map to 500 so Stripe redelivers the event.

use http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;
use crate::ports::PaymentError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No Stripe-Signature header on the request.
    #[error("Missing signature header")]
    MissingSignature,

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable window (5 minutes).
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Test-mode event delivered to an endpoint that requires live mode.
    #[error("Livemode mismatch")]
    LivemodeMismatch,

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A Stripe API call failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Another request holds the user's rollover claim.
    #[error("Rollover already in progress for user {0}")]
    RolloverInProgress(String),

    /// A verified event carried an object of the wrong shape for its type.
    #[error("Malformed {object}: {message}")]
    MalformedObject {
        object: &'static str,
        message: String,
    },
}

impl WebhookError {
    /// Returns true if Stripe should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_)
                | WebhookError::Provider(_)
                | WebhookError::RolloverInProgress(_)
        )
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// Status codes determine Stripe's retry behavior:
    /// - 4xx: rejected delivery, retrying will not help
    /// - 5xx: Server error, will retry
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::LivemodeMismatch => StatusCode::BAD_REQUEST,

            WebhookError::Database(_)
            | WebhookError::Provider(_)
            | WebhookError::RolloverInProgress(_)
            | WebhookError::MalformedObject { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl WebhookError {
    pub fn malformed(object: &'static str, err: serde_json::Error) -> Self {
        WebhookError::MalformedObject {
            object,
            message: err.to_string(),
        }
    }

    /// True for failures raised after the event passed verification.
    pub fn is_processing_failure(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}

impl From<PaymentError> for WebhookError {
    fn from(err: PaymentError) -> Self {
        WebhookError::Provider(err.to_string())
    }
}
