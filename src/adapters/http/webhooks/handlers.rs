//! HTTP handlers for the webhook endpoint.
//!
//! These handlers connect Axum routes to the webhook command handler and
//! translate its result into the status codes Stripe acts on.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::handlers::billing::{
    HandleStripeWebhookCommand, HandleStripeWebhookHandler, HandleStripeWebhookResult,
};
use crate::domain::billing::WebhookError;

use super::dto::{HealthResponse, WebhookAckResponse, WebhookErrorResponse};

/// Header carrying the Stripe signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub webhook_handler: Arc<HandleStripeWebhookHandler>,
}

impl WebhookAppState {
    pub fn new(webhook_handler: HandleStripeWebhookHandler) -> Self {
        Self {
            webhook_handler: Arc::new(webhook_handler),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Handle Stripe webhook events
pub async fn handle_stripe_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, WebhookApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandleStripeWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let response = match state.webhook_handler.handle(cmd).await? {
        HandleStripeWebhookResult::Duplicate { .. } => WebhookAckResponse::duplicate(),
        HandleStripeWebhookResult::Processed { .. } | HandleStripeWebhookResult::NotConfigured => {
            WebhookAckResponse::received()
        }
    };

    Ok(Json(response))
}

/// GET /health - Liveness check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts webhook errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        if self.0.is_processing_failure() {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookAckResponse::processing_failed()),
            )
                .into_response();
        }

        (
            self.0.status_code(),
            Json(WebhookErrorResponse::new(self.0.to_string())),
        )
            .into_response()
    }
}
