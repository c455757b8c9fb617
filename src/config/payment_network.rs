//! Payment network configuration

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Payment network platform API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNetworkConfig {
    /// Base URL of the platform API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Server API key, sent as `Authorization: Key <api_key>`
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Upper bound on each verification call, in milliseconds
    #[serde(default = "default_verification_timeout_ms")]
    pub verification_timeout_ms: u64,

    /// Sandbox network (test currency)
    #[serde(default = "default_sandbox")]
    pub sandbox: bool,
}

impl PaymentNetworkConfig {
    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    /// True if an API key is present and non-blank
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    /// Validate payment network configuration
    ///
    /// The API key is always required: approvals are checked against the
    /// network's own record of each payment.
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(ValidationError::InvalidApiBaseUrl);
        }
        if self.verification_timeout_ms == 0 || self.verification_timeout_ms > 60_000 {
            return Err(ValidationError::InvalidVerificationTimeout);
        }
        if !self.has_api_key() {
            return Err(ValidationError::MissingRequired("PAYMENT_NETWORK__API_KEY"));
        }
        if production && !self.api_base_url.starts_with("https://") {
            return Err(ValidationError::ApiMustBeHttps);
        }
        Ok(())
    }
}

impl Default for PaymentNetworkConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            verification_timeout_ms: default_verification_timeout_ms(),
            sandbox: default_sandbox(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.minepi.com".to_string()
}

fn default_verification_timeout_ms() -> u64 {
    5_000
}

fn default_sandbox() -> bool {
    true
}
