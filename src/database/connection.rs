//! # Connection Pools
//!
//! Builds the primary-store pool and one lightweight pool per configured
//! replica. Pools are lazy: the process boots even when a store is
//! unreachable, and the health monitor reports the outage on the first
//! probe tick instead of the server refusing to start.

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Build the primary pool from configuration.
pub fn primary_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating primary database pool"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .test_before_acquire(true)
        .connect_lazy(&config.url)
}

/// Build a small pool for one replica. Replica pools only serve probes and
/// degraded reads, so they stay tiny.
pub fn replica_pool(url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .test_before_acquire(true)
        .connect_lazy(url)
}
