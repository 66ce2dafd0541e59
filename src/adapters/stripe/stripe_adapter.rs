//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port against the Stripe REST API using
//! form-encoded requests and HTTP basic auth with the secret key.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key);
//! let adapter = StripeBillingAdapter::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::PaymentConfig;
use crate::domain::billing::SubscriptionObject;
use crate::ports::{
    BillingProvider, CreateSubscriptionRequest, PaymentError, PaymentErrorCode,
    UpdateSubscriptionRequest,
};

/// Per-request timeout for Stripe API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Builds a config from application settings, or `None` when no API
    /// key is set.
    pub fn from_payment_config(payment: &PaymentConfig) -> Option<Self> {
        let key = payment.stripe_api_key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key).with_base_url(payment.stripe_api_base_url.clone()))
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn subscriptions_url(&self) -> String {
        format!("{}/v1/subscriptions", self.api_base_url)
    }

    fn subscription_url(&self, subscription_id: &str) -> String {
        format!("{}/v1/subscriptions/{}", self.api_base_url, subscription_id)
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Stripe billing provider adapter.
pub struct StripeBillingAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeBillingAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<SubscriptionObject, PaymentError> {
        let response = request
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &body));
        }

        response.json::<SubscriptionObject>().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl BillingProvider for StripeBillingAdapter {
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionObject, PaymentError> {
        let params = create_subscription_params(&request);

        let subscription = self
            .send(
                self.http_client
                    .post(self.config.subscriptions_url())
                    .header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str())
                    .form(&params),
            )
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            customer_id = %request.customer_id,
            idempotency_key = %request.idempotency_key,
            "Created Stripe subscription"
        );

        Ok(subscription)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionObject, PaymentError> {
        self.send(
            self.http_client
                .get(self.config.subscription_url(subscription_id)),
        )
        .await
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        request: UpdateSubscriptionRequest,
    ) -> Result<SubscriptionObject, PaymentError> {
        let params = update_subscription_params(&request);

        let subscription = self
            .send(
                self.http_client
                    .post(self.config.subscription_url(subscription_id))
                    .form(&params),
            )
            .await?;

        tracing::debug!(
            subscription_id = %subscription.id,
            cancel_at_period_end = subscription.cancel_at_period_end,
            "Updated Stripe subscription"
        );

        Ok(subscription)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Request Encoding
// ════════════════════════════════════════════════════════════════════════════════

fn metadata_params(metadata: &crate::domain::billing::Metadata) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = metadata
        .iter()
        .map(|(key, value)| (format!("metadata[{}]", key), value.clone()))
        .collect();
    params.sort();
    params
}

fn create_subscription_params(request: &CreateSubscriptionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("customer".to_string(), request.customer_id.clone()),
        ("items[0][price]".to_string(), request.price_id.clone()),
    ];

    if let Some(days) = request.trial_period_days.filter(|days| *days > 0) {
        params.push(("trial_period_days".to_string(), days.to_string()));
    }

    params.extend(metadata_params(&request.metadata));
    params
}

fn update_subscription_params(request: &UpdateSubscriptionRequest) -> Vec<(String, String)> {
    let mut params = metadata_params(&request.metadata);

    if let Some(cancel) = request.cancel_at_period_end {
        params.push(("cancel_at_period_end".to_string(), cancel.to_string()));
    }

    params
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Decoding
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn error_from_response(status: u16, body: &str) -> PaymentError {
    let code = PaymentErrorCode::from_status(status);

    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => {
            let detail = parsed.error;
            let message = detail
                .message
                .unwrap_or_else(|| format!("Stripe API error (HTTP {})", status));
            let error = PaymentError::new(code, message);
            match detail.code.or(detail.error_type) {
                Some(provider_code) => error.with_provider_code(provider_code),
                None => error,
            }
        }
        Err(_) => PaymentError::new(code, format!("Stripe API error (HTTP {}): {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::Metadata;

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = StripeConfig::new("sk_test_key");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(
            config.subscription_url("sub_1"),
            "https://api.stripe.com/v1/subscriptions/sub_1"
        );
    }

    #[test]
    fn config_with_base_url_strips_trailing_slash() {
        let config = StripeConfig::new("key").with_base_url("http://localhost:12111/");
        assert_eq!(config.subscriptions_url(), "http://localhost:12111/v1/subscriptions");
    }

    #[test]
    fn config_from_payment_config_requires_key() {
        assert!(StripeConfig::from_payment_config(&PaymentConfig::default()).is_none());

        let payment = PaymentConfig {
            stripe_api_key: "sk_test_123".to_string(),
            stripe_api_base_url: "http://localhost:12111".to_string(),
            ..Default::default()
        };
        let config = StripeConfig::from_payment_config(&payment).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn config_debug_redacts_key() {
        let rendered = format!("{:?}", StripeConfig::new("sk_live_secret"));
        assert!(!rendered.contains("sk_live_secret"));
        assert!(rendered.contains("REDACTED"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Request Encoding Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn create_params_include_price_trial_and_metadata() {
        let request = CreateSubscriptionRequest {
            customer_id: "cus_1".to_string(),
            price_id: "price_org".to_string(),
            trial_period_days: Some(30),
            metadata: metadata(&[("user_id", "user-1"), ("rollover_context", "x")]),
            idempotency_key: "rollover:checkout:cs_1".to_string(),
        };

        let params = create_subscription_params(&request);

        assert_eq!(param(&params, "customer"), Some("cus_1"));
        assert_eq!(param(&params, "items[0][price]"), Some("price_org"));
        assert_eq!(param(&params, "trial_period_days"), Some("30"));
        assert_eq!(param(&params, "metadata[user_id]"), Some("user-1"));
        assert_eq!(param(&params, "metadata[rollover_context]"), Some("x"));
        // The key travels as a header, never as a form field.
        assert!(param(&params, "idempotency_key").is_none());
    }

    #[test]
    fn create_params_omit_zero_trial() {
        let request = CreateSubscriptionRequest {
            customer_id: "cus_1".to_string(),
            price_id: "price_org".to_string(),
            trial_period_days: Some(0),
            metadata: Metadata::new(),
            idempotency_key: "k".to_string(),
        };

        assert!(param(&create_subscription_params(&request), "trial_period_days").is_none());
    }

    #[test]
    fn update_params_encode_cancel_flag() {
        let request = UpdateSubscriptionRequest {
            metadata: metadata(&[("installments_paid", "3")]),
            cancel_at_period_end: Some(true),
        };

        let params = update_subscription_params(&request);

        assert_eq!(param(&params, "metadata[installments_paid]"), Some("3"));
        assert_eq!(param(&params, "cancel_at_period_end"), Some("true"));
    }

    #[test]
    fn update_params_leave_cancel_flag_untouched_when_none() {
        let params = update_subscription_params(&UpdateSubscriptionRequest::default());
        assert!(params.is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Error Decoding Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn error_body_with_code_is_decoded() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such customer: 'cus_x'"}}"#;

        let error = error_from_response(400, body);

        assert_eq!(error.code, PaymentErrorCode::InvalidRequest);
        assert_eq!(error.provider_code.as_deref(), Some("resource_missing"));
        assert_eq!(error.message, "No such customer: 'cus_x'");
        assert!(!error.retryable);
    }

    #[test]
    fn error_body_without_code_falls_back_to_type() {
        let body = r#"{"error":{"type":"api_error","message":"boom"}}"#;

        let error = error_from_response(500, body);

        assert_eq!(error.code, PaymentErrorCode::ProviderError);
        assert_eq!(error.provider_code.as_deref(), Some("api_error"));
        assert!(error.retryable);
    }

    #[test]
    fn unparseable_error_body_kept_in_message() {
        let error = error_from_response(429, "slow down");

        assert_eq!(error.code, PaymentErrorCode::RateLimitExceeded);
        assert!(error.message.contains("slow down"));
        assert!(error.provider_code.is_none());
    }

    #[test]
    fn idempotency_conflict_is_not_retryable() {
        let error = error_from_response(409, "{}");
        assert_eq!(error.code, PaymentErrorCode::IdempotencyConflict);
        assert!(!error.retryable);
    }

    #[test]
    fn adapter_builds() {
        assert!(StripeBillingAdapter::new(StripeConfig::new("sk_test_key")).is_ok());
    }
}
