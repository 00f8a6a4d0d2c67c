//! # Web API
//!
//! Axum HTTP surface over the resilience and auto-fix cores. Response
//! shapes and status codes are a published contract; see
//! [`crate::web::errors`] for the mapping.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::AppState;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;

/// Build the full router. Principal extraction wraps everything; the write
/// guard wraps only store-mutating admin routes, because the apply
/// endpoints must report gate failures in contract order with health last.
pub fn build_router(state: AppState) -> Router {
    let failover = Router::new()
        .route("/status", get(handlers::failover::get_status))
        .route("/health", get(handlers::failover::get_health))
        .route("/trigger", post(handlers::failover::post_trigger))
        .route("/reconnect", post(handlers::failover::post_reconnect))
        .route("/history", get(handlers::failover::get_history))
        .route("/rules", get(handlers::failover::get_rules))
        .route("/rules/{id}", put(handlers::failover::put_rule))
        .route("/metrics", get(handlers::failover::get_metrics))
        .route("/diagnostics", get(handlers::failover::get_diagnostics));

    let autofix = Router::new()
        .route("/candidates", get(handlers::autofix::get_candidates))
        .route("/preview/{id}", get(handlers::autofix::get_preview))
        .route("/apply/{id}", post(handlers::autofix::post_apply))
        .route("/batch", post(handlers::autofix::post_batch))
        .route("/detect", post(handlers::autofix::post_detect))
        .route("/runs", get(handlers::autofix::get_runs))
        .route("/policies", get(handlers::autofix::get_policies))
        .route(
            "/policies/{kind}",
            put(handlers::autofix::put_policy)
                .route_layer(from_fn_with_state(state.clone(), middleware::write_guard)),
        );

    Router::new()
        .nest("/failover", failover)
        .nest("/autofix", autofix)
        .layer(from_fn_with_state(state.clone(), middleware::extract_principal))
        .with_state(state)
}
