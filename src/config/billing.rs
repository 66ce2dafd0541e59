//! Billing rules configuration
//!
//! Controls the rollover onto the organization plan, the installment cap,
//! and which elective modules may be bought.

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::ElectiveCatalog;

/// Billing rules configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Recurring price for the organization plan. Unset disables rollover.
    #[serde(default)]
    pub platform_price_id: Option<String>,

    /// Installment cap used when a subscription carries no stored limit.
    #[serde(default = "default_installment_limit")]
    pub installment_limit: u32,

    /// Trial days granted on the plan after an accelerator bundle purchase.
    #[serde(default = "default_included_trial_days")]
    pub included_trial_days: u32,

    /// Comma-separated elective module slugs that may be purchased.
    #[serde(default = "default_elective_modules")]
    pub elective_modules: String,

    /// Seconds a per-user rollover claim is honoured.
    #[serde(default = "default_rollover_claim_lease")]
    pub rollover_claim_lease_secs: u64,
}

impl BillingConfig {
    /// Price id for rollovers, if the feature is enabled.
    pub fn platform_price(&self) -> Option<&str> {
        self.platform_price_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn elective_catalog(&self) -> ElectiveCatalog {
        ElectiveCatalog::new(self.elective_modules.split(','))
    }

    pub fn rollover_claim_lease(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.rollover_claim_lease_secs)
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(price) = self.platform_price() {
            if !price.starts_with("price_") {
                return Err(ValidationError::InvalidPriceId(price.to_string()));
            }
        }
        if self.installment_limit == 0 {
            return Err(ValidationError::InvalidInstallmentLimit);
        }
        if self.included_trial_days > 730 {
            return Err(ValidationError::InvalidTrialDays);
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            platform_price_id: None,
            installment_limit: default_installment_limit(),
            included_trial_days: default_included_trial_days(),
            elective_modules: default_elective_modules(),
            rollover_claim_lease_secs: default_rollover_claim_lease(),
        }
    }
}

fn default_installment_limit() -> u32 {
    3
}

fn default_included_trial_days() -> u32 {
    30
}

fn default_elective_modules() -> String {
    [
        "grant-writing",
        "board-governance",
        "volunteer-management",
        "fundraising-strategy",
        "financial-management",
    ]
    .join(",")
}

fn default_rollover_claim_lease() -> u64 {
    600
}
