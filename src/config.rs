use crate::error::{Result, ServiceError};
use std::env;
use std::time::Duration;

/// Checkout configuration for the payment reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Line-item description shown on the gateway's checkout page.
    pub product_name: String,
    pub currency: String,
    /// Redirect after payment. `{CHECKOUT_SESSION_ID}` is substituted by the gateway.
    pub success_url: String,
    pub cancel_url: String,
    /// Upper bound on any single gateway call.
    pub gateway_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            product_name: "Blood donation fund contribution".to_string(),
            currency: "usd".to_string(),
            success_url: "http://localhost:5173/payment-success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "http://localhost:5173/funding".to_string(),
            gateway_timeout: Duration::from_secs(10),
        }
    }
}

impl CheckoutConfig {
    /// Loads configuration from `REDCELL_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let gateway_timeout = match env::var("REDCELL_GATEWAY_TIMEOUT_MS") {
            Ok(raw) => raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|_| {
                ServiceError::ValidationError(
                    "REDCELL_GATEWAY_TIMEOUT_MS must be a whole number of milliseconds"
                        .to_string(),
                )
            })?,
            Err(_) => defaults.gateway_timeout,
        };

        Ok(Self {
            product_name: env::var("REDCELL_PRODUCT_NAME").unwrap_or(defaults.product_name),
            currency: env::var("REDCELL_CURRENCY").unwrap_or(defaults.currency),
            success_url: env::var("REDCELL_SUCCESS_URL").unwrap_or(defaults.success_url),
            cancel_url: env::var("REDCELL_CANCEL_URL").unwrap_or(defaults.cancel_url),
            gateway_timeout,
        })
    }
}
