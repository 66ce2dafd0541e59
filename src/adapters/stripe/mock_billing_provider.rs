//! Mock billing provider for testing.
//!
//! Provides a configurable mock implementation of `BillingProvider` for unit
//! and integration tests. Supports:
//! - Seeded subscriptions
//! - Error injection
//! - Call tracking
//! - Stripe-style idempotency (a repeated key returns the first result)

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::billing::{Expandable, SubscriptionObject};
use crate::ports::{
    BillingProvider, CreateSubscriptionRequest, PaymentError, UpdateSubscriptionRequest,
};

/// Mock billing provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockBillingProvider::new();
/// mock.add_subscription(subscription);
/// mock.set_method_error("create_subscription", PaymentError::network("down"));
///
/// // Clones share state, so keep one for assertions.
/// let provider: Arc<dyn BillingProvider> = Arc::new(mock.clone());
/// ```
#[derive(Default)]
pub struct MockBillingProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Subscriptions by ID.
    subscriptions: HashMap<String, SubscriptionObject>,

    /// Subscription ID created for each idempotency key.
    idempotency_keys: HashMap<String, String>,

    /// Every create request received, in order.
    create_requests: Vec<CreateSubscriptionRequest>,

    /// Every update request received, in order.
    update_requests: Vec<(String, UpdateSubscriptionRequest)>,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    created_count: u32,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockBillingProvider {
    /// Create a new mock provider with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the other assertions.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a subscription to the "database".
    pub fn add_subscription(&self, subscription: SubscriptionObject) {
        let id = subscription.id.clone();
        self.state().subscriptions.insert(id, subscription);
    }

    /// Current state of a subscription.
    pub fn subscription(&self, subscription_id: &str) -> Option<SubscriptionObject> {
        self.state().subscriptions.get(subscription_id).cloned()
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Create requests received so far.
    pub fn create_requests(&self) -> Vec<CreateSubscriptionRequest> {
        self.state().create_requests.clone()
    }

    /// Update requests received so far, with their subscription ids.
    pub fn update_requests(&self) -> Vec<(String, UpdateSubscriptionRequest)> {
        self.state().update_requests.clone()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.state();

        // Check method-specific error first
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        // Check global error (consumes it)
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

impl Clone for MockBillingProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionObject, PaymentError> {
        self.record_call(
            "create_subscription",
            vec![
                request.customer_id.clone(),
                request.price_id.clone(),
                request.idempotency_key.clone(),
            ],
        );
        self.check_error("create_subscription")?;

        let mut state = self.state();
        state.create_requests.push(request.clone());

        if let Some(existing) = state
            .idempotency_keys
            .get(&request.idempotency_key)
            .and_then(|id| state.subscriptions.get(id))
        {
            return Ok(existing.clone());
        }

        state.created_count += 1;
        let trialing = request.trial_period_days.map_or(false, |days| days > 0);
        let subscription = SubscriptionObject {
            id: format!("sub_mock_{}", state.created_count),
            customer: Some(Expandable::Id(request.customer_id)),
            status: if trialing { "trialing" } else { "active" }.to_string(),
            current_period_end: Some(chrono::Utc::now().timestamp() + 30 * 24 * 60 * 60),
            cancel_at_period_end: false,
            metadata: request.metadata,
            items: Default::default(),
        };

        state
            .idempotency_keys
            .insert(request.idempotency_key, subscription.id.clone());
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());

        Ok(subscription)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionObject, PaymentError> {
        self.record_call("retrieve_subscription", vec![subscription_id.to_string()]);
        self.check_error("retrieve_subscription")?;

        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Subscription"))
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        request: UpdateSubscriptionRequest,
    ) -> Result<SubscriptionObject, PaymentError> {
        self.record_call("update_subscription", vec![subscription_id.to_string()]);
        self.check_error("update_subscription")?;

        let mut state = self.state();
        state
            .update_requests
            .push((subscription_id.to_string(), request.clone()));

        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::not_found("Subscription"))?;

        subscription.metadata.extend(request.metadata);
        if let Some(cancel) = request.cancel_at_period_end {
            subscription.cancel_at_period_end = cancel;
        }

        Ok(subscription.clone())
    }
}
