//! HTTP adapter for Stripe webhook deliveries.
//!
//! - `POST /api/webhooks/stripe` - Verify, deduplicate and process one event
//! - `GET /health` - Liveness check

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{HealthResponse, WebhookAckResponse, WebhookErrorResponse};
pub use handlers::{handle_stripe_webhook, health, WebhookAppState, STRIPE_SIGNATURE_HEADER};
pub use routes::{webhook_router, webhook_routes};
