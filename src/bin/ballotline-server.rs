//! Ballotline resilience core server.
//!
//! Wires configuration, pools, the health polling loop and the HTTP
//! surface. The process starts even when the primary store is down: pools
//! are lazy, the monitor flips the health signal, and the mode controller
//! degrades reads instead of refusing to boot.

use anyhow::Context;
use ballotline_core::config::ConfigManager;
use ballotline_core::database;
use ballotline_core::logging::init_structured_logging;
use ballotline_core::resilience::{HealthMonitor, ModeController, PoolProber, Prober};
use ballotline_core::web::auth::JwtAuthenticator;
use ballotline_core::web::{build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("configuration load failed")?;
    let config = manager.config().clone();

    // Pools are lazy: the server boots even when the primary is unreachable
    // and the monitor reports it unhealthy on the first tick.
    let pool = database::primary_pool(&config.database).context("invalid primary database url")?;

    if let Err(e) = database::run_migrations(&pool).await {
        warn!(error = %e, "Migrations deferred; primary store unreachable at startup");
    }

    let probe_timeout = Duration::from_millis(config.resilience.probe_timeout_ms);
    let primary_prober: Arc<dyn Prober> =
        Arc::new(PoolProber::new(pool.clone(), probe_timeout));

    let mut replica_probers: Vec<(String, Arc<dyn Prober>)> = Vec::new();
    for replica in &config.database.replicas {
        match database::replica_pool(&replica.url) {
            Ok(replica_pool) => {
                replica_probers.push((
                    replica.id.clone(),
                    Arc::new(PoolProber::new(replica_pool, probe_timeout)),
                ));
            }
            Err(e) => {
                warn!(replica = %replica.id, error = %e, "Replica pool misconfigured");
            }
        }
    }

    let monitor = Arc::new(HealthMonitor::new(config.resilience.clone()));
    let controller = ModeController::new(Arc::clone(&monitor), config.resilience.clone());
    let _polling = controller.spawn_polling(Arc::clone(&primary_prober), replica_probers);

    let authenticator = if config.web.auth.enabled {
        Some(Arc::new(
            JwtAuthenticator::from_config(&config.web.auth)
                .context("authenticator setup failed")?,
        ))
    } else {
        warn!("Authentication disabled; every caller is treated as the local admin");
        None
    };

    let bind_address = config.web.bind_address.clone();
    let state = AppState::new(
        config,
        pool,
        monitor,
        controller,
        primary_prober,
        authenticator,
        None,
    );
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(environment = manager.environment(), bind_address = %bind_address, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
