//! PostgreSQL settings.
//!
//! Without a URL the service runs on the in-memory stores, which is only
//! allowed outside production.

use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `postgres://` or `postgresql://` URL.
    pub url: Option<String>,

    pub max_connections: u32,

    /// How long a payment signal may wait for a pooled connection.
    pub acquire_timeout_secs: u64,

    /// Apply `migrations/` before serving.
    pub run_migrations: bool,
}

impl DatabaseConfig {
    /// The configured URL, ignoring a blank value.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(url) = self.url() else {
            return Ok(());
        };
        if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if !(1..=100).contains(&self.max_connections) {
            return Err(ValidationError::InvalidPoolSize);
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
            run_migrations: false,
        }
    }
}
