//! Billing provider port for the Stripe subscription API.
//!
//! The reconciler only needs three subscription calls: create (for
//! rollovers), retrieve (to refresh projections) and update (to push
//! installment progress). Subscriptions come back as the same
//! [`SubscriptionObject`] shape webhooks carry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{Metadata, SubscriptionObject};
use crate::domain::foundation::{DomainError, ErrorCode};

/// Port for billing provider integrations.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a subscription. The idempotency key is forwarded so Stripe
    /// returns the original subscription if the call is repeated.
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionObject, PaymentError>;

    /// Get subscription by provider ID.
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionObject, PaymentError>;

    /// Merge metadata into a subscription and optionally set its
    /// cancel-at-period-end flag.
    async fn update_subscription(
        &self,
        subscription_id: &str,
        request: UpdateSubscriptionRequest,
    ) -> Result<SubscriptionObject, PaymentError>;
}

/// Request to create a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionRequest {
    /// Provider's customer ID.
    pub customer_id: String,

    /// Recurring price to subscribe to.
    pub price_id: String,

    /// Optional free trial.
    pub trial_period_days: Option<u32>,

    /// Metadata written onto the new subscription.
    pub metadata: Metadata,

    /// Idempotency key for safe retries.
    pub idempotency_key: String,
}

/// Request to update a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSubscriptionRequest {
    /// Keys to set; keys not listed are left untouched by Stripe.
    pub metadata: Metadata,

    /// `Some(true)` schedules cancellation at period end.
    pub cancel_at_period_end: Option<bool>,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Create a provider-side error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::NotFound => ErrorCode::SubscriptionNotFound,
            PaymentErrorCode::InvalidRequest => ErrorCode::ValidationFailed,
            _ => ErrorCode::ExternalServiceError,
        };

        DomainError::new(code, err.message)
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Stripe rejected the parameters.
    InvalidRequest,

    /// Idempotency key reused with different parameters.
    IdempotencyConflict,

    /// Provider API error.
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }

    /// Maps an HTTP status from the Stripe API.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 402 => PaymentErrorCode::InvalidRequest,
            401 | 403 => PaymentErrorCode::AuthenticationError,
            404 => PaymentErrorCode::NotFound,
            409 => PaymentErrorCode::IdempotencyConflict,
            429 => PaymentErrorCode::RateLimitExceeded,
            _ => PaymentErrorCode::ProviderError,
        }
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::IdempotencyConflict => "idempotency_conflict",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn BillingProvider) {}
    }

    #[test]
    fn payment_error_retryable() {
        assert!(PaymentErrorCode::NetworkError.is_retryable());
        assert!(PaymentErrorCode::RateLimitExceeded.is_retryable());
        assert!(PaymentErrorCode::ProviderError.is_retryable());

        assert!(!PaymentErrorCode::InvalidRequest.is_retryable());
        assert!(!PaymentErrorCode::NotFound.is_retryable());
        assert!(!PaymentErrorCode::IdempotencyConflict.is_retryable());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(PaymentErrorCode::from_status(400), PaymentErrorCode::InvalidRequest);
        assert_eq!(PaymentErrorCode::from_status(401), PaymentErrorCode::AuthenticationError);
        assert_eq!(PaymentErrorCode::from_status(404), PaymentErrorCode::NotFound);
        assert_eq!(PaymentErrorCode::from_status(409), PaymentErrorCode::IdempotencyConflict);
        assert_eq!(PaymentErrorCode::from_status(429), PaymentErrorCode::RateLimitExceeded);
        assert_eq!(PaymentErrorCode::from_status(503), PaymentErrorCode::ProviderError);
    }

    #[test]
    fn payment_error_display() {
        let err = PaymentError::not_found("Subscription");
        assert_eq!(err.to_string(), "not_found: Subscription not found");
    }

    #[test]
    fn payment_error_with_provider_code() {
        let err = PaymentError::provider("boom").with_provider_code("resource_missing");
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
        assert!(err.retryable);
    }

    #[test]
    fn payment_error_converts_to_domain_error() {
        let domain_err: DomainError = PaymentError::not_found("Subscription").into();
        assert_eq!(domain_err.code, ErrorCode::SubscriptionNotFound);
        assert!(domain_err.message.contains("Subscription"));
    }
}
