//! Domain service for system-level operations.
//!
//! Handles the status summary and configuration management.

use crate::api::types::SystemStatus;
use crate::config::Config;
use thiserror::Error;

/// Errors specific to system operations.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for SystemError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(format!("{err:#}"))
    }
}

/// Domain service trait for system operations.
#[async_trait::async_trait]
pub trait SystemService: Send + Sync {
    /// Version, uptime, library counts and the last media sync.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::Database`] on connection failures.
    async fn get_status(
        &self,
        uptime_secs: u64,
        version: &str,
    ) -> Result<SystemStatus, SystemError>;

    /// Gets the current configuration with every secret masked.
    async fn get_config(&self) -> Result<Config, SystemError>;

    /// Validates, saves and swaps in a new configuration.
    ///
    /// Masked secrets in `new_config` keep their current value.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError::Validation`] if the config is invalid.
    /// Returns [`SystemError::Internal`] if saving fails.
    async fn update_config(&self, new_config: Config) -> Result<Config, SystemError>;
}
