//! Integration tests for the Stripe webhook endpoint.
//!
//! These tests drive the axum router end to end over in-memory ports:
//! 1. Signature failures are rejected before touching the ledger
//! 2. Events are processed once and redeliveries short-circuit
//! 3. Processing failures answer 500 and succeed on redelivery
//!    (including a rollover blocked by another holder's claim)
//! 4. Installment and rollover flows reach the billing provider

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use billing_reconciler::adapters::http::{webhook_router, WebhookAppState};
use billing_reconciler::adapters::memory::{
    InMemoryPurchaseRepository, InMemoryRolloverClaims, InMemorySubscriptionRepository,
    InMemoryWebhookLedger,
};
use billing_reconciler::adapters::stripe::MockBillingProvider;
use billing_reconciler::application::{HandleStripeWebhookHandler, WebhookPorts, WebhookSettings};
use billing_reconciler::domain::billing::{
    sign_payload, StripeWebhookVerifier, SubscriptionObject, INSTALLMENTS_PAID_KEY,
    ROLLOVER_CONTEXT_KEY,
};
use billing_reconciler::domain::foundation::{SubscriptionId, Timestamp, UserId};
use billing_reconciler::ports::RolloverClaims;
use billing_reconciler::domain::billing::{SubscriptionProjection, SubscriptionStatus};

const SECRET: &str = "whsec_integration";

// =============================================================================
// Test Infrastructure
// =============================================================================

struct TestApp {
    router: Router,
    provider: MockBillingProvider,
    ledger: InMemoryWebhookLedger,
    subscriptions: InMemorySubscriptionRepository,
    purchases: InMemoryPurchaseRepository,
    claims: InMemoryRolloverClaims,
}

impl TestApp {
    fn new() -> Self {
        let provider = MockBillingProvider::new();
        let ledger = InMemoryWebhookLedger::new();
        let subscriptions = InMemorySubscriptionRepository::new();
        let purchases = InMemoryPurchaseRepository::new();
        let claims = InMemoryRolloverClaims::new();

        let handler = HandleStripeWebhookHandler::new(
            Some(StripeWebhookVerifier::new(SecretString::new(SECRET.to_string()))),
            Some(Arc::new(provider.clone())),
            WebhookPorts {
                ledger: Arc::new(ledger.clone()),
                subscriptions: Arc::new(subscriptions.clone()),
                purchases: Arc::new(purchases.clone()),
                claims: Arc::new(claims.clone()),
            },
            WebhookSettings {
                platform_price_id: Some("price_org".to_string()),
                ..WebhookSettings::default()
            },
        );

        Self {
            router: webhook_router().with_state(WebhookAppState::new(handler)),
            provider,
            ledger,
            subscriptions,
            purchases,
            claims,
        }
    }

    async fn post(&self, body: &str, signature: Option<String>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/stripe")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header("Stripe-Signature", signature);
        }
        let request = request.body(Body::from(body.to_string())).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn deliver(&self, event: &Value) -> (StatusCode, Value) {
        let body = event.to_string();
        let signature = sign_payload(SECRET, chrono::Utc::now().timestamp(), &body);
        self.post(&body, Some(signature)).await
    }
}

fn event(id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "created": 1_700_000_000,
        "livemode": false,
        "data": { "object": object }
    })
}

fn accelerator_checkout(id: &str) -> Value {
    json!({
        "id": id,
        "mode": "payment",
        "payment_status": "paid",
        "customer": "cus_42",
        "client_reference_id": "user-42",
        "metadata": { "kind": "accelerator", "coaching_included": "true" }
    })
}

fn installment_subscription(paid: &str) -> SubscriptionObject {
    serde_json::from_value(json!({
        "id": "sub_inst",
        "customer": "cus_42",
        "status": "active",
        "current_period_end": 1_900_000_000,
        "metadata": {
            "user_id": "user-42",
            "kind": "accelerator_installments",
            INSTALLMENTS_PAID_KEY: paid
        }
    }))
    .unwrap()
}

// =============================================================================
// Verification
// =============================================================================

#[tokio::test]
async fn bad_signature_is_rejected_with_400() {
    let app = TestApp::new();
    let body = event("evt_1", "checkout.session.completed", accelerator_checkout("cs_1")).to_string();
    let signature = sign_payload("whsec_wrong", chrono::Utc::now().timestamp(), &body);

    let (status, json) = app.post(&body, Some(signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
    assert!(app.ledger.is_empty().await);
    assert_eq!(app.purchases.accelerator_count().await, 0);
}

#[tokio::test]
async fn missing_signature_header_is_rejected_with_400() {
    let app = TestApp::new();
    let body = event("evt_1", "invoice.paid", json!({ "id": "in_1" })).to_string();

    let (status, _) = app.post(&body, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.ledger.is_empty().await);
}

// =============================================================================
// Checkout scenarios
// =============================================================================

#[tokio::test]
async fn accelerator_checkout_records_purchase_and_starts_trial_plan() {
    let app = TestApp::new();

    let (status, json) = app
        .deliver(&event("evt_acc", "checkout.session.completed", accelerator_checkout("cs_acc")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "received": true }));

    let purchase = app.purchases.accelerator("cs_acc").await.unwrap();
    assert_eq!(purchase.status.as_str(), "active");
    assert!(purchase.coaching_included);
    assert_eq!(app.purchases.write_count().await, 1);

    let created = app.provider.create_requests();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].customer_id, "cus_42");
    assert_eq!(created[0].price_id, "price_org");
    assert_eq!(created[0].trial_period_days, Some(30));
    assert_eq!(
        created[0].metadata.get(ROLLOVER_CONTEXT_KEY).map(String::as_str),
        Some("accelerator_bundle_one_time")
    );

    let ledger = app.ledger.payload("evt_acc").await.unwrap();
    assert_eq!(ledger["processed"], true);
    assert!(ledger["processed_at"].is_string());
}

#[tokio::test]
async fn existing_subscription_blocks_rollover() {
    let app = TestApp::new();
    app.subscriptions
        .seed(SubscriptionProjection::new(
            UserId::new("user-42").unwrap(),
            Some("cus_42".to_string()),
            SubscriptionId::new("sub_existing").unwrap(),
            SubscriptionStatus::Trialing,
            None,
            None,
        ))
        .await;

    let (status, _) = app
        .deliver(&event("evt_acc", "checkout.session.completed", accelerator_checkout("cs_acc")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(app.purchases.accelerator("cs_acc").await.is_some());
    assert!(!app.provider.was_called("create_subscription"));
}

#[tokio::test]
async fn elective_outside_allow_list_is_acknowledged_but_not_recorded() {
    let app = TestApp::new();
    let checkout = json!({
        "id": "cs_el",
        "mode": "payment",
        "payment_status": "paid",
        "client_reference_id": "user-42",
        "metadata": { "kind": "elective", "module_slug": "not-a-module" }
    });

    let (status, _) = app
        .deliver(&event("evt_el", "checkout.session.completed", checkout))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.purchases.elective_count().await, 0);
    assert_eq!(app.ledger.payload("evt_el").await.unwrap()["processed"], true);
}

// =============================================================================
// Installments
// =============================================================================

#[tokio::test]
async fn third_installment_schedules_cancellation() {
    let app = TestApp::new();
    app.provider.add_subscription(installment_subscription("2"));

    let (status, _) = app
        .deliver(&event(
            "evt_inv",
            "invoice.paid",
            json!({
                "id": "in_3",
                "billing_reason": "subscription_cycle",
                "subscription": "sub_inst"
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);

    let remote = app.provider.subscription("sub_inst").unwrap();
    assert_eq!(
        remote.metadata.get(INSTALLMENTS_PAID_KEY).map(String::as_str),
        Some("3")
    );
    assert!(remote.cancel_at_period_end);

    let local = app.subscriptions.get("sub_inst").await.unwrap();
    assert_eq!(local.status, SubscriptionStatus::Active);
    assert_eq!(
        local.metadata.get(INSTALLMENTS_PAID_KEY).map(String::as_str),
        Some("3")
    );
}

#[tokio::test]
async fn finished_installment_plan_rolls_onto_organization_plan() {
    let app = TestApp::new();
    let ended = json!({
        "id": "sub_inst",
        "customer": "cus_42",
        "status": "canceled",
        "metadata": {
            "user_id": "user-42",
            "kind": "accelerator_installments",
            INSTALLMENTS_PAID_KEY: "3"
        }
    });

    let (status, _) = app
        .deliver(&event("evt_del", "customer.subscription.deleted", ended))
        .await;

    assert_eq!(status, StatusCode::OK);
    let created = app.provider.create_requests();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].idempotency_key, "rollover:sub_inst:evt_del");
    assert_eq!(
        created[0].metadata.get(ROLLOVER_CONTEXT_KEY).map(String::as_str),
        Some("accelerator_installments_complete")
    );
    assert_eq!(
        app.subscriptions.get("sub_inst").await.unwrap().status,
        SubscriptionStatus::Canceled
    );
}

// =============================================================================
// Ledger behaviour
// =============================================================================

#[tokio::test]
async fn redelivery_is_reported_as_duplicate() {
    let app = TestApp::new();
    let delivery = event("evt_dup", "checkout.session.completed", accelerator_checkout("cs_dup"));

    let (first, _) = app.deliver(&delivery).await;
    let (second, json) = app.deliver(&delivery).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(json, json!({ "received": true, "duplicate": true }));
    assert_eq!(app.purchases.write_count().await, 1);
    assert_eq!(app.provider.call_count("create_subscription"), 1);
}

#[tokio::test]
async fn failed_processing_returns_500_and_redelivery_completes() {
    let app = TestApp::new();
    app.purchases.fail_writes().arm(1);
    let delivery = event("evt_retry", "checkout.session.completed", accelerator_checkout("cs_retry"));

    let (status, json) = app.deliver(&delivery).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({ "received": true, "error": "processing_failed" }));
    let ledger = app.ledger.payload("evt_retry").await.unwrap();
    assert_eq!(ledger["processed"], false);
    assert!(ledger["failed_at"].is_string());

    let (status, json) = app.deliver(&delivery).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "received": true }));
    assert!(app.purchases.accelerator("cs_retry").await.is_some());
    assert_eq!(app.ledger.payload("evt_retry").await.unwrap()["processed"], true);
}

#[tokio::test]
async fn rollover_blocked_by_held_claim_is_redelivered() {
    let app = TestApp::new();
    let user = UserId::new("user-42").unwrap();
    let other = app.claims.hold(&user, Timestamp::now().plus_secs(300)).await;
    let delivery = event(
        "evt_claimed",
        "checkout.session.completed",
        accelerator_checkout("cs_claimed"),
    );

    let (status, json) = app.deliver(&delivery).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({ "received": true, "error": "processing_failed" }));
    assert_eq!(app.ledger.payload("evt_claimed").await.unwrap()["processed"], false);
    assert!(app.provider.create_requests().is_empty());

    app.claims.release(&other).await.unwrap();
    let (status, _) = app.deliver(&delivery).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.provider.create_requests().len(), 1);
    assert_eq!(app.ledger.payload("evt_claimed").await.unwrap()["processed"], true);

    let (_, json) = app.deliver(&delivery).await;
    assert_eq!(json["duplicate"], true);
    assert_eq!(app.provider.create_requests().len(), 1);
}

#[tokio::test]
async fn pre_ledger_rows_are_not_reprocessed() {
    let app = TestApp::new();
    app.ledger
        .seed("evt_old", "checkout.session.completed", json!({ "id": "evt_old" }))
        .await;

    let (status, json) = app
        .deliver(&event("evt_old", "checkout.session.completed", accelerator_checkout("cs_old")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["duplicate"], true);
    assert_eq!(app.purchases.accelerator_count().await, 0);
}

// =============================================================================
// Operational
// =============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
