//! HTTP listener settings.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;

/// Where the API listens and how long a request may run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port`, parsed at load time.
    pub listen_addr: SocketAddr,

    pub environment: Environment,

    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Budget for a whole request, payment network round trips included.
    pub request_timeout_secs: u64,

    /// Comma-separated browser origins. Empty allows any origin.
    pub allowed_origins: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn allowed_origins(&self) -> impl Iterator<Item = &str> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=120).contains(&self.request_timeout_secs) {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            environment: Environment::Development,
            log_level: "info,creator_paywall=debug,sqlx=warn".to_string(),
            request_timeout_secs: 30,
            allowed_origins: String::new(),
        }
    }
}
