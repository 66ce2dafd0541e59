//! Axum router configuration for webhook endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{handle_stripe_webhook, health, WebhookAppState};

/// Create the Stripe webhook router.
///
/// Webhooks carry no user authentication; they are verified by signature.
///
/// # Routes
/// - `POST /stripe` - Handle Stripe webhooks
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete service router.
///
/// Mounts the webhook routes under `/api/webhooks` next to `/health`.
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/webhooks", webhook_routes())
}
