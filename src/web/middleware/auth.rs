//! # Authentication Middleware
//!
//! Extracts the caller's principal from a Bearer token and stores it in the
//! request extensions as a [`CallerIdentity`]. Extraction never rejects:
//! whether a principal is *required* is the apply pipeline's first gate,
//! which must answer with its own status code rather than a middleware
//! rejection.

use crate::web::auth::{AuthPrincipal, CallerIdentity, JwtAuthenticator};
use crate::web::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

/// Resolve the caller's identity and attach it; never rejects the request.
pub async fn extract_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match &state.authenticator {
        Some(authenticator) => request
            .headers()
            .get("authorization")
            .and_then(|header| JwtAuthenticator::extract_bearer_token(header).ok())
            .and_then(|token| authenticator.validate_token(token).ok())
            .map(AuthPrincipal::from),
        // Auth disabled (development): every caller is the local admin.
        None => Some(AuthPrincipal {
            subject: "dev".to_string(),
            email: "dev@localhost".to_string(),
            roles: vec!["admin".to_string()],
        }),
    };

    if let Some(principal) = &principal {
        debug!(principal = %principal.subject, "Principal extracted");
    }
    request.extensions_mut().insert(CallerIdentity(principal));

    next.run(request).await
}
