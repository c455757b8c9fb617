//! Reconciliation sweeper configuration

use std::time::Duration;

use serde::Deserialize;

use crate::application::reconciliation::SweeperConfig;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Run the incomplete payment sweeper
    #[serde(default = "default_enable_sweeper")]
    pub enable_sweeper: bool,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// A non-terminal payment untouched for this long is swept
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,

    /// Payments refreshed in parallel per sweep
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
}

impl ReconciliationConfig {
    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_secs(self.sweep_interval_secs),
            stale_after: Duration::from_secs(self.stale_after_secs),
            batch_size: self.sweep_batch_size,
            concurrency: self.sweep_concurrency,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_secs == 0
            || self.sweep_batch_size == 0
            || self.sweep_concurrency == 0
        {
            return Err(ValidationError::InvalidSweepSettings);
        }
        Ok(())
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enable_sweeper: default_enable_sweeper(),
            sweep_interval_secs: default_sweep_interval(),
            stale_after_secs: default_stale_after(),
            sweep_batch_size: default_sweep_batch_size(),
            sweep_concurrency: default_sweep_concurrency(),
        }
    }
}

fn default_enable_sweeper() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_stale_after() -> u64 {
    300
}

fn default_sweep_batch_size() -> usize {
    50
}

fn default_sweep_concurrency() -> usize {
    4
}
