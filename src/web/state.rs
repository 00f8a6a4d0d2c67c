//! # Web API Application State
//!
//! Shared state for the HTTP surface: the live controller and monitor, the
//! database pool, the auto-fix components, and the optional orchestration
//! capability.

use crate::autofix::{ApprovalGateChain, Remediator, SuggestionEngine};
use crate::config::CoreConfig;
use crate::resilience::{DegradedCache, HealthMonitor, ModeController, Prober};
use crate::web::auth::JwtAuthenticator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;

/// One recorded orchestration execution, reported by the optional
/// orchestration capability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationExecution {
    pub name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
}

/// Optional capability: an orchestration module may or may not be present.
/// Absence is a normal, typed state (`Option<Arc<dyn ...>>`), never an
/// exception path.
pub trait OrchestrationSource: Send + Sync {
    fn recent_executions(&self, limit: usize) -> Vec<OrchestrationExecution>;
}

/// Shared application state for the web API.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub pool: PgPool,
    pub monitor: Arc<HealthMonitor>,
    pub controller: Arc<ModeController>,
    pub engine: Arc<SuggestionEngine>,
    pub gates: Arc<ApprovalGateChain>,
    pub remediator: Arc<Remediator>,
    /// Present when auth is enabled; handlers treat `None` as a disabled
    /// authenticator and inject no principal.
    pub authenticator: Option<Arc<JwtAuthenticator>>,
    pub cache: Arc<DegradedCache>,
    pub orchestration: Option<Arc<dyn OrchestrationSource>>,
    /// Out-of-band prober the reconnect endpoint uses.
    pub primary_prober: Arc<dyn Prober>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CoreConfig,
        pool: PgPool,
        monitor: Arc<HealthMonitor>,
        controller: Arc<ModeController>,
        primary_prober: Arc<dyn Prober>,
        authenticator: Option<Arc<JwtAuthenticator>>,
        orchestration: Option<Arc<dyn OrchestrationSource>>,
    ) -> Self {
        let engine = Arc::new(SuggestionEngine::new(pool.clone(), config.autofix.clone()));
        let gates = Arc::new(ApprovalGateChain::new(Arc::clone(&controller)));
        let remediator = Arc::new(Remediator::new(pool.clone()));
        let cache = Arc::new(DegradedCache::new(
            crate::constants::DEGRADED_CACHE_CAPACITY,
        ));

        Self {
            config: Arc::new(config),
            pool,
            monitor,
            controller,
            engine,
            gates,
            remediator,
            authenticator,
            cache,
            orchestration,
            primary_prober,
        }
    }
}
