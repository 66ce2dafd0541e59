//! Payment configuration (Stripe)
//!
//! Both Stripe credentials are optional. An empty value means "not
//! configured": the webhook endpoint then acknowledges deliveries without
//! processing them.

use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key (`sk_...` or restricted `rk_...`)
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe webhook signing secret (`whsec_...`)
    #[serde(default)]
    pub stripe_webhook_secret: String,

    /// Stripe API base URL; overridden in tests and with stripe-mock.
    #[serde(default = "default_api_base_url")]
    pub stripe_api_base_url: String,

    /// Reject test-mode events
    #[serde(default)]
    pub stripe_require_livemode: bool,
}

impl PaymentConfig {
    /// True when both the API key and the webhook secret are present.
    pub fn is_configured(&self) -> bool {
        !self.stripe_api_key.trim().is_empty() && !self.stripe_webhook_secret.trim().is_empty()
    }

    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_") || self.stripe_api_key.starts_with("rk_test_")
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if !self.stripe_api_key.is_empty()
            && !self.stripe_api_key.starts_with("sk_")
            && !self.stripe_api_key.starts_with("rk_")
        {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.is_empty() && !self.stripe_webhook_secret.starts_with("whsec_")
        {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if *environment == Environment::Production
            && !self.stripe_api_base_url.starts_with("https://")
        {
            return Err(ValidationError::StripeBaseUrlMustBeHttps);
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base_url: default_api_base_url(),
            stripe_require_livemode: false,
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}
