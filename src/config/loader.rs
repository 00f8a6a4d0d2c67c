//! # Configuration Loader
//!
//! Loads [`CoreConfig`] from layered sources: `config/ballotline.toml`, an
//! environment-specific override file, then `BALLOTLINE__`-prefixed
//! environment variables. No silent fallbacks: a malformed file is an error,
//! a missing file falls back to defaults explicitly.

use super::CoreConfig;
use crate::error::CoreError;
use config::{Config, Environment, File};
use tracing::info;

/// Owns the loaded configuration and the environment it was resolved for.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: CoreConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration for the environment named by `BALLOTLINE_ENV`
    /// (default `development`).
    pub fn load() -> Result<Self, CoreError> {
        let environment =
            std::env::var("BALLOTLINE_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_for_environment(&environment)
    }

    /// Load configuration for an explicit environment name.
    pub fn load_for_environment(environment: &str) -> Result<Self, CoreError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/ballotline").required(false))
            .add_source(File::with_name(&format!("config/ballotline.{environment}")).required(false))
            .add_source(Environment::with_prefix("BALLOTLINE").separator("__"));

        let config: CoreConfig = builder
            .build()
            .map_err(|e| CoreError::Configuration(format!("failed to read configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| CoreError::Configuration(format!("invalid configuration: {e}")))?;

        config.validate()?;

        info!(
            environment = environment,
            replicas = config.database.replicas.len(),
            probe_interval_ms = config.resilience.probe_interval_ms,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            environment: environment.to_string(),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}
