//! HandleStripeWebhookHandler - verifies, deduplicates and dispatches Stripe events.
//!
//! Flow for one delivery:
//!
//! 1. Verify the `Stripe-Signature` header (and livemode, when required).
//!    Failures return 400 and leave no trace.
//! 2. Record the event in the ledger. Already processed events stop here.
//! 3. Dispatch on the event type.
//! 4. Mark the ledger entry processed, or annotate the failure and return
//!    an error so Stripe redelivers.
//!
//! Nothing is rolled back on failure. A retry re-runs the whole dispatch;
//! every write is an upsert and Stripe subscription creation carries an
//! idempotency key.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{BillingConfig, PaymentConfig};
use crate::domain::billing::{
    calculate_installment_progress, checkout_rollover_key, is_installment_plan,
    lifecycle_rollover_key, should_roll_to_organization_plan, AcceleratorPurchase,
    CheckoutMode, CheckoutSessionObject, ElectiveCatalog, ElectivePurchase, InstallmentInput,
    InvoiceObject, PurchaseKind, RolloverContext, RolloverDecisionInput, StripeEvent,
    StripeEventType, StripeWebhookVerifier, SubscriptionObject, SubscriptionStatus,
    WebhookError,
};
use crate::domain::foundation::{SubscriptionId, UserId};
use crate::ports::{
    BillingProvider, PurchaseRepository, RolloverClaims, SubscriptionRepository,
    UpdateSubscriptionRequest, WebhookLedger, DEFAULT_CLAIM_LEASE,
};

use super::event_deduplicator::EventDeduplicator;
use super::projection_writer::ProjectionWriter;
use super::rollover_initiator::{RolloverInitiator, RolloverOutcome, RolloverRequest};

/// Command to handle one webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleStripeWebhookCommand {
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value.
    pub signature: Option<String>,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleStripeWebhookResult {
    /// Dispatch ran and the ledger entry is marked processed.
    Processed {
        event_id: String,
        event_type: String,
        action: WebhookAction,
    },
    /// The ledger says this event needs no further work.
    Duplicate { event_id: String },
    /// Webhook secret or Stripe client missing; acknowledged untouched.
    NotConfigured,
}

/// What dispatch did for a processed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    AcceleratorPurchased {
        checkout_session_id: String,
        rollover: Option<RolloverOutcome>,
    },
    ElectivePurchased {
        module_slug: String,
    },
    ElectiveRejected {
        module_slug: String,
    },
    InstallmentRecorded {
        subscription_id: SubscriptionId,
        installments_paid: u32,
        cancel_scheduled: bool,
    },
    SubscriptionSynced {
        subscription_id: SubscriptionId,
        rollover: Option<RolloverOutcome>,
    },
    /// Recognized event without enough data to act on.
    Skipped {
        reason: &'static str,
    },
    /// Event type this service does not handle.
    Ignored,
}

/// Billing rules the handler applies.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Reject test-mode events.
    pub require_livemode: bool,
    /// Installment cap when a subscription stores none.
    pub installment_limit: u32,
    /// Trial granted on the plan after a bundle purchase.
    pub included_trial_days: u32,
    pub elective_catalog: ElectiveCatalog,
    /// Organization plan price. `None` disables rollovers.
    pub platform_price_id: Option<String>,
    pub rollover_claim_lease: Duration,
}

impl WebhookSettings {
    pub fn from_config(payment: &PaymentConfig, billing: &BillingConfig) -> Self {
        Self {
            require_livemode: payment.stripe_require_livemode,
            installment_limit: billing.installment_limit,
            included_trial_days: billing.included_trial_days,
            elective_catalog: billing.elective_catalog(),
            platform_price_id: billing.platform_price().map(str::to_string),
            rollover_claim_lease: billing.rollover_claim_lease(),
        }
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self::from_config(&PaymentConfig::default(), &BillingConfig::default())
    }
}

/// Ports the handler writes through.
#[derive(Clone)]
pub struct WebhookPorts {
    pub ledger: Arc<dyn WebhookLedger>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub purchases: Arc<dyn PurchaseRepository>,
    pub claims: Arc<dyn RolloverClaims>,
}

/// Handler for Stripe webhook deliveries.
pub struct HandleStripeWebhookHandler {
    verifier: Option<StripeWebhookVerifier>,
    provider: Option<Arc<dyn BillingProvider>>,
    dedup: EventDeduplicator,
    projections: ProjectionWriter,
    purchases: Arc<dyn PurchaseRepository>,
    rollover: RolloverInitiator,
    settings: WebhookSettings,
}

impl HandleStripeWebhookHandler {
    pub fn new(
        verifier: Option<StripeWebhookVerifier>,
        provider: Option<Arc<dyn BillingProvider>>,
        ports: WebhookPorts,
        settings: WebhookSettings,
    ) -> Self {
        let claim_lease = if settings.rollover_claim_lease.is_zero() {
            DEFAULT_CLAIM_LEASE
        } else {
            settings.rollover_claim_lease
        };

        Self {
            rollover: RolloverInitiator::new(
                provider.clone(),
                Arc::clone(&ports.subscriptions),
                ports.claims,
                settings.platform_price_id.clone(),
                claim_lease,
            ),
            verifier,
            provider,
            dedup: EventDeduplicator::new(ports.ledger),
            projections: ProjectionWriter::new(ports.subscriptions),
            purchases: ports.purchases,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleStripeWebhookCommand,
    ) -> Result<HandleStripeWebhookResult, WebhookError> {
        let (Some(verifier), Some(provider)) = (self.verifier.as_ref(), self.provider.as_ref())
        else {
            tracing::warn!("Stripe webhook received but Stripe is not configured; acknowledging");
            return Ok(HandleStripeWebhookResult::NotConfigured);
        };

        // 1. Verify webhook signature and parse event
        let signature = cmd
            .signature
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(WebhookError::MissingSignature)?;

        let event = verifier
            .verify_and_parse(&cmd.payload, signature)
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected Stripe webhook");
                e
            })?;

        if self.settings.require_livemode && !event.is_live() {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Rejected test-mode Stripe event"
            );
            return Err(WebhookError::LivemodeMismatch);
        }

        // 2. Deduplicate
        let decision = self.dedup.check(&event).await.map_err(|e| {
            tracing::error!(event_id = %event.id, error = %e, "Webhook ledger unavailable");
            WebhookError::from(e)
        })?;

        if !decision.should_process() {
            tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                ?decision,
                "Skipping duplicate Stripe event"
            );
            return Ok(HandleStripeWebhookResult::Duplicate { event_id: event.id });
        }

        // 3. Dispatch
        match self.dispatch(&event, &**provider).await {
            Ok(action) => {
                // 4. Finalize
                self.dedup.mark_processed(&event.id).await?;

                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    ?action,
                    "Processed Stripe event"
                );

                Ok(HandleStripeWebhookResult::Processed {
                    event_id: event.id,
                    event_type: event.event_type,
                    action,
                })
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Failed to process Stripe event"
                );
                self.dedup.mark_failed(&event.id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        event: &StripeEvent,
        provider: &dyn BillingProvider,
    ) -> Result<WebhookAction, WebhookError> {
        match event.parsed_type() {
            StripeEventType::CheckoutSessionCompleted => {
                let session: CheckoutSessionObject = event
                    .deserialize_object()
                    .map_err(|e| WebhookError::malformed("checkout session", e))?;
                self.handle_checkout_completed(&session, provider).await
            }
            StripeEventType::InvoicePaid => {
                let invoice: InvoiceObject = event
                    .deserialize_object()
                    .map_err(|e| WebhookError::malformed("invoice", e))?;
                self.handle_invoice_paid(&invoice, provider).await
            }
            event_type if event_type.is_subscription_lifecycle() => {
                let subscription: SubscriptionObject = event
                    .deserialize_object()
                    .map_err(|e| WebhookError::malformed("subscription", e))?;
                self.handle_subscription_lifecycle(event, event_type, &subscription)
                    .await
            }
            _ => {
                tracing::debug!(event_type = %event.event_type, "Ignoring Stripe event type");
                Ok(WebhookAction::Ignored)
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // checkout.session.completed
    // ════════════════════════════════════════════════════════════════════════════

    async fn handle_checkout_completed(
        &self,
        session: &CheckoutSessionObject,
        provider: &dyn BillingProvider,
    ) -> Result<WebhookAction, WebhookError> {
        match session.mode {
            CheckoutMode::Payment => self.handle_one_time_purchase(session).await,
            CheckoutMode::Subscription => {
                self.handle_subscription_checkout(session, provider).await
            }
            CheckoutMode::Setup | CheckoutMode::Unknown => Ok(WebhookAction::Ignored),
        }
    }

    async fn handle_one_time_purchase(
        &self,
        session: &CheckoutSessionObject,
    ) -> Result<WebhookAction, WebhookError> {
        let Some(kind) = PurchaseKind::from_metadata(&session.metadata) else {
            return Ok(WebhookAction::Ignored);
        };

        let Some(user_id) = session.user_id().and_then(|raw| UserId::new(raw).ok()) else {
            tracing::warn!(
                checkout_session_id = %session.id,
                "Checkout has no user_id or client_reference_id"
            );
            return Ok(WebhookAction::Skipped {
                reason: "checkout_without_user",
            });
        };

        match kind {
            PurchaseKind::Accelerator => self.handle_accelerator_purchase(session, user_id).await,
            PurchaseKind::Elective => self.handle_elective_purchase(session, user_id).await,
        }
    }

    async fn handle_accelerator_purchase(
        &self,
        session: &CheckoutSessionObject,
        user_id: UserId,
    ) -> Result<WebhookAction, WebhookError> {
        let purchase = AcceleratorPurchase::from_checkout(session, user_id.clone());
        self.purchases.upsert_accelerator(&purchase).await?;

        tracing::info!(
            checkout_session_id = %session.id,
            user_id = %user_id,
            status = purchase.status.as_str(),
            coaching_included = purchase.coaching_included,
            "Recorded accelerator purchase"
        );

        let rollover = match (session.is_paid(), session.customer_id()) {
            (true, Some(customer_id)) => Some(
                self.rollover
                    .maybe_start(RolloverRequest {
                        user_id,
                        customer_id: customer_id.to_string(),
                        idempotency_key: checkout_rollover_key(&session.id),
                        trial_period_days: Some(self.settings.included_trial_days),
                        context: RolloverContext::AcceleratorBundleOneTime,
                    })
                    .await?,
            ),
            (true, None) => {
                tracing::warn!(
                    checkout_session_id = %session.id,
                    "Paid accelerator checkout has no customer; cannot start plan"
                );
                None
            }
            (false, _) => None,
        };

        Ok(WebhookAction::AcceleratorPurchased {
            checkout_session_id: session.id.clone(),
            rollover,
        })
    }

    async fn handle_elective_purchase(
        &self,
        session: &CheckoutSessionObject,
        user_id: UserId,
    ) -> Result<WebhookAction, WebhookError> {
        let Some(module_slug) = ElectivePurchase::requested_module(&session.metadata) else {
            tracing::warn!(checkout_session_id = %session.id, "Elective checkout has no module_slug");
            return Ok(WebhookAction::Skipped {
                reason: "elective_without_module",
            });
        };

        if !self.settings.elective_catalog.contains(module_slug) {
            tracing::warn!(
                checkout_session_id = %session.id,
                module_slug,
                "Elective module not in catalog; purchase not recorded"
            );
            return Ok(WebhookAction::ElectiveRejected {
                module_slug: module_slug.to_string(),
            });
        }

        let purchase = ElectivePurchase::from_checkout(session, user_id.clone(), module_slug);
        self.purchases.upsert_elective(&purchase).await?;

        tracing::info!(
            checkout_session_id = %session.id,
            user_id = %user_id,
            module_slug,
            "Recorded elective purchase"
        );

        Ok(WebhookAction::ElectivePurchased {
            module_slug: purchase.module_slug,
        })
    }

    async fn handle_subscription_checkout(
        &self,
        session: &CheckoutSessionObject,
        provider: &dyn BillingProvider,
    ) -> Result<WebhookAction, WebhookError> {
        let Some(subscription_id) = session.subscription_id() else {
            tracing::warn!(
                checkout_session_id = %session.id,
                "Subscription checkout has no subscription id"
            );
            return Ok(WebhookAction::Skipped {
                reason: "checkout_without_subscription",
            });
        };

        let subscription = provider.retrieve_subscription(subscription_id).await?;

        let user_id = match session.user_id().and_then(|raw| UserId::new(raw).ok()) {
            Some(user_id) => Some(user_id),
            None => self.projections.resolve_owner(&subscription).await?,
        };
        let Some(user_id) = user_id else {
            tracing::warn!(
                checkout_session_id = %session.id,
                subscription_id,
                "Cannot resolve user for subscription checkout"
            );
            return Ok(WebhookAction::Skipped {
                reason: "subscription_without_user",
            });
        };

        let projection = self
            .projections
            .write_subscription(user_id, &subscription)
            .await?;

        Ok(WebhookAction::SubscriptionSynced {
            subscription_id: projection.subscription_id,
            rollover: None,
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // invoice.paid
    // ════════════════════════════════════════════════════════════════════════════

    async fn handle_invoice_paid(
        &self,
        invoice: &InvoiceObject,
        provider: &dyn BillingProvider,
    ) -> Result<WebhookAction, WebhookError> {
        let Some(subscription_id) = invoice.subscription_id() else {
            tracing::debug!(invoice_id = %invoice.id, "Invoice has no subscription; ignoring");
            return Ok(WebhookAction::Skipped {
                reason: "invoice_without_subscription",
            });
        };

        let mut subscription = provider.retrieve_subscription(subscription_id).await?;

        let mut recorded = None;
        if is_installment_plan(&subscription.metadata) {
            let progress = calculate_installment_progress(InstallmentInput {
                billing_reason: invoice.billing_reason.as_deref(),
                metadata: &subscription.metadata,
                cancel_at_period_end: subscription.cancel_at_period_end,
                fallback_limit: self.settings.installment_limit,
            });

            if progress.eligible {
                subscription = provider
                    .update_subscription(
                        subscription_id,
                        UpdateSubscriptionRequest {
                            metadata: progress.metadata_update(),
                            cancel_at_period_end: progress
                                .should_set_cancel_at_period_end
                                .then_some(true),
                        },
                    )
                    .await?;

                tracing::info!(
                    subscription_id,
                    invoice_id = %invoice.id,
                    installments_paid = progress.next_installments_paid,
                    installment_limit = progress.installment_limit,
                    cancel_at_period_end = progress.should_set_cancel_at_period_end,
                    "Recorded installment payment"
                );
                recorded = Some(progress);
            }
        }

        let Some(user_id) = self.projections.resolve_owner(&subscription).await? else {
            tracing::warn!(subscription_id, "Cannot resolve user for paid invoice");
            return Ok(WebhookAction::Skipped {
                reason: "subscription_without_user",
            });
        };

        let projection = self
            .projections
            .write_subscription(user_id, &subscription)
            .await?;

        Ok(match recorded {
            Some(progress) => WebhookAction::InstallmentRecorded {
                subscription_id: projection.subscription_id,
                installments_paid: progress.next_installments_paid,
                cancel_scheduled: progress.should_set_cancel_at_period_end,
            },
            None => WebhookAction::SubscriptionSynced {
                subscription_id: projection.subscription_id,
                rollover: None,
            },
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // customer.subscription.*
    // ════════════════════════════════════════════════════════════════════════════

    async fn handle_subscription_lifecycle(
        &self,
        event: &StripeEvent,
        event_type: StripeEventType,
        subscription: &SubscriptionObject,
    ) -> Result<WebhookAction, WebhookError> {
        let Some(user_id) = self.projections.resolve_owner(subscription).await? else {
            tracing::warn!(
                event_id = %event.id,
                subscription_id = %subscription.id,
                "Cannot resolve user for subscription event"
            );
            return Ok(WebhookAction::Skipped {
                reason: "subscription_without_user",
            });
        };

        let projection = self
            .projections
            .write_subscription(user_id.clone(), subscription)
            .await?;

        let roll_over = should_roll_to_organization_plan(RolloverDecisionInput {
            event_type,
            subscription_status: SubscriptionStatus::to_status(&subscription.status),
            metadata: &subscription.metadata,
            fallback_limit: self.settings.installment_limit,
        });

        let rollover = match (roll_over, subscription.customer_id()) {
            (true, Some(customer_id)) => Some(
                self.rollover
                    .maybe_start(RolloverRequest {
                        user_id,
                        customer_id: customer_id.to_string(),
                        idempotency_key: lifecycle_rollover_key(&subscription.id, &event.id),
                        trial_period_days: None,
                        context: RolloverContext::AcceleratorInstallmentsComplete,
                    })
                    .await?,
            ),
            (true, None) => {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    "Completed installment plan has no customer; cannot start plan"
                );
                None
            }
            (false, _) => None,
        };

        Ok(WebhookAction::SubscriptionSynced {
            subscription_id: projection.subscription_id,
            rollover,
        })
    }
}
