//! # Configuration System
//!
//! Typed configuration for the resilience core, loaded from TOML with
//! environment-specific overrides. Every struct carries workable defaults so
//! tests can construct configuration directly without files.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ballotline_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let probe_interval = manager.config().resilience.probe_interval_ms;
//! # Ok(())
//! # }
//! ```

pub mod loader;

pub use loader::ConfigManager;

use crate::constants;
use serde::{Deserialize, Serialize};

/// Root configuration for the resilience core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database: DatabaseConfig,
    pub resilience: ResilienceConfig,
    pub web: WebConfig,
    pub autofix: AutofixConfig,
}

/// Primary store and replica connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    /// Read replicas, probed and tracked individually. May be empty.
    pub replicas: Vec<ReplicaConfig>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

/// A statically configured read replica.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    pub id: String,
    pub url: String,
}

/// Health probing and failover behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub probe_interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Consecutive failures before the primary is marked unhealthy.
    pub failure_threshold: u32,
    /// A replica probe older than this disqualifies the replica from
    /// serving reads.
    pub replica_staleness_secs: i64,
    pub reconnect_max_attempts: u32,
    pub reconnect_backoff_ms: u64,
    pub failover_history_size: usize,
    pub diagnostics_buffer_size: usize,
}

/// Web server and authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    pub auth: AuthConfig,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub token_expiry_hours: u64,
}

/// Detection thresholds for the suggestion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofixConfig {
    /// Minimum candidates expected on a ballot before a race is flagged.
    pub min_candidates_per_race: i64,
    /// Calendar month (1-12) in which the flagged local election type is
    /// expected to occur.
    pub expected_local_election_month: u32,
    /// Local election type the month heuristic applies to.
    pub local_election_type: String,
    pub batch_apply_limit: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/ballotline_development".to_string(),
            replicas: Vec::new(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_seconds: 10,
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: constants::DEFAULT_PROBE_INTERVAL_MS,
            probe_timeout_ms: constants::DEFAULT_PROBE_TIMEOUT_MS,
            failure_threshold: constants::DEFAULT_FAILURE_THRESHOLD,
            replica_staleness_secs: constants::DEFAULT_REPLICA_STALENESS_SECS,
            reconnect_max_attempts: constants::DEFAULT_RECONNECT_MAX_ATTEMPTS,
            reconnect_backoff_ms: constants::DEFAULT_RECONNECT_BACKOFF_MS,
            failover_history_size: constants::FAILOVER_HISTORY_SIZE,
            diagnostics_buffer_size: constants::DIAGNOSTICS_BUFFER_SIZE,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret: String::new(),
            jwt_issuer: "ballotline".to_string(),
            jwt_audience: "ballotline-api".to_string(),
            token_expiry_hours: 12,
        }
    }
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            min_candidates_per_race: 2,
            expected_local_election_month: 11,
            local_election_type: "school_board".to_string(),
            batch_apply_limit: 50,
        }
    }
}

impl CoreConfig {
    /// Validate invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), crate::error::CoreError> {
        if self.database.url.is_empty() {
            return Err(crate::error::CoreError::Configuration(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.resilience.failure_threshold == 0 {
            return Err(crate::error::CoreError::Configuration(
                "resilience.failure_threshold must be at least 1".to_string(),
            ));
        }
        if !(1..=12).contains(&self.autofix.expected_local_election_month) {
            return Err(crate::error::CoreError::Configuration(
                "autofix.expected_local_election_month must be 1-12".to_string(),
            ));
        }
        if self.web.auth.enabled && self.web.auth.jwt_secret.is_empty() {
            return Err(crate::error::CoreError::Configuration(
                "web.auth.jwt_secret required when auth is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
