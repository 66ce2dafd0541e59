//! billing-reconciler server
//!
//! Receives Stripe webhooks and keeps the local billing tables in step.

use std::sync::Arc;

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use billing_reconciler::adapters::http::{webhook_router, WebhookAppState};
use billing_reconciler::adapters::postgres::{
    PostgresPurchaseRepository, PostgresRolloverClaims, PostgresSubscriptionRepository,
    PostgresWebhookLedger,
};
use billing_reconciler::adapters::stripe::{StripeBillingAdapter, StripeConfig};
use billing_reconciler::application::{HandleStripeWebhookHandler, WebhookPorts, WebhookSettings};
use billing_reconciler::config::{AppConfig, ServerConfig};
use billing_reconciler::domain::billing::StripeWebhookVerifier;
use billing_reconciler::ports::BillingProvider;
use secrecy::SecretString;

type StartupError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting billing-reconciler"
    );

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    tracing::info!("Database connection established");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let provider: Option<Arc<dyn BillingProvider>> =
        match StripeConfig::from_payment_config(&config.payment) {
            Some(stripe) => Some(Arc::new(StripeBillingAdapter::new(stripe)?)),
            None => {
                tracing::warn!("Stripe API key not set; webhooks will be acknowledged only");
                None
            }
        };

    let secret = config.payment.stripe_webhook_secret.trim();
    let verifier = if secret.is_empty() {
        tracing::warn!("Stripe webhook secret not set; webhooks will be acknowledged only");
        None
    } else {
        Some(StripeWebhookVerifier::new(SecretString::new(secret.to_string())))
    };

    let settings = WebhookSettings::from_config(&config.payment, &config.billing);
    if settings.platform_price_id.is_none() {
        tracing::warn!("Platform price id not set; organization plan rollovers disabled");
    }

    let handler = HandleStripeWebhookHandler::new(
        verifier,
        provider,
        WebhookPorts {
            ledger: Arc::new(PostgresWebhookLedger::new(pool.clone())),
            subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
            purchases: Arc::new(PostgresPurchaseRepository::new(pool.clone())),
            claims: Arc::new(PostgresRolloverClaims::new(pool)),
        },
        settings,
    );

    let app = webhook_router()
        .with_state(WebhookAppState::new(handler))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

/// Plain output in development, JSON lines in production.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&server.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
