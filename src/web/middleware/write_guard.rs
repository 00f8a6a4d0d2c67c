//! # Write Guard
//!
//! The single choke point guaranteeing "no write operation executes while
//! the system is unhealthy". Layered ahead of every mutating route in the
//! wider application (and this crate's own store-mutating admin routes);
//! individual handlers never re-implement the check.
//!
//! If the read-only override is set, or the current mode is non-writable,
//! the request is rejected with the degraded-mode error before any business
//! logic runs. The auto-fix apply endpoints are deliberately *not* behind
//! this guard: their gate chain must report authentication and policy
//! failures ahead of health, so health is checked there as the final gate
//! instead.

use crate::web::errors::ApiError;
use crate::web::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

pub async fn write_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.controller.writes_allowed() {
        warn!(
            mode = %state.controller.mode(),
            read_only = state.controller.is_read_only(),
            path = %request.uri().path(),
            "Write rejected by guard"
        );
        return Err(ApiError::DegradedMode);
    }
    Ok(next.run(request).await)
}
