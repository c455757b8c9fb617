//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Request timeout must be between 1 and 120 seconds")]
    InvalidTimeout,

    #[error("Request timeout must outlast the verification timeout")]
    RequestShorterThanVerification,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool max_connections must be between 1 and 100")]
    InvalidPoolSize,

    #[error("Payment network API base URL must be http(s)")]
    InvalidApiBaseUrl,

    #[error("Payment network API must use HTTPS in production")]
    ApiMustBeHttps,

    #[error("Verification timeout must be between 1 and 60000 ms")]
    InvalidVerificationTimeout,

    #[error("Sweep settings must be positive")]
    InvalidSweepSettings,
}
