//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `CREATOR_PAYWALL`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use creator_paywall::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod payment_network;
mod reconciliation;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment_network::PaymentNetworkConfig;
pub use reconciliation::ReconciliationConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults. Only the payment network API key must be
/// supplied; without a database URL a development server runs on
/// in-memory stores.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection. Leave the URL empty for in-memory storage.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Payment network platform API
    #[serde(default)]
    pub payment_network: PaymentNetworkConfig,

    /// Incomplete payment sweeper
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `CREATOR_PAYWALL` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// - `CREATOR_PAYWALL__SERVER__LISTEN_ADDR=0.0.0.0:8080` -> `server.listen_addr`
    /// - `CREATOR_PAYWALL__PAYMENT_NETWORK__API_KEY=...` -> `payment_network.api_key`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("CREATOR_PAYWALL")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Production additionally requires a database URL and an HTTPS
    /// platform API.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        if self.is_production() && self.database.url().is_none() {
            return Err(ValidationError::MissingRequired("DATABASE__URL"));
        }
        self.payment_network.validate(self.is_production())?;
        if self.server.request_timeout() <= self.payment_network.verification_timeout() {
            return Err(ValidationError::RequestShorterThanVerification);
        }
        self.reconciliation.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
