//! # API Errors
//!
//! Maps the core error taxonomy onto the stable HTTP contract. Callers
//! (including the host application's own middleware) depend on these exact
//! shapes and status codes, so they are tested, not incidental.

use crate::autofix::gates::GateRejection;
use crate::autofix::remediator::AutofixError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

/// Web-facing error. Each variant carries exactly what its response body
/// needs; internal detail stays in logs.
#[derive(Debug)]
pub enum ApiError {
    /// Gate chain rejection; status code depends on the failed gate.
    Gate(GateRejection),
    /// Apply-path rejection from the remediator.
    Autofix(AutofixError),
    /// Read endpoint refused because the store is unhealthy.
    DegradedMode,
    /// Manual failover could not be performed.
    FailoverFailed(String),
    /// Malformed request body or parameters.
    BadRequest(String),
    /// Unknown resource.
    NotFound(String),
    /// Everything the caller must not see the detail of.
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Gate(rejection) => match rejection {
                GateRejection::AuthenticationRequired => StatusCode::UNAUTHORIZED,
                GateRejection::InsufficientPrivileges => StatusCode::FORBIDDEN,
                GateRejection::PoliciesDisabled { .. } => StatusCode::LOCKED,
                GateRejection::SeverityNotAllowed { .. } => StatusCode::LOCKED,
                GateRejection::ApprovalRequired => StatusCode::BAD_REQUEST,
                GateRejection::ApprovalMismatch => StatusCode::FORBIDDEN,
                GateRejection::SystemUnhealthy => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Autofix(error) => match error {
                AutofixError::NotFound(_) => StatusCode::NOT_FOUND,
                AutofixError::NotOpen { .. } => StatusCode::CONFLICT,
                AutofixError::NotAutofixable(_) => StatusCode::BAD_REQUEST,
                AutofixError::NoSeed { .. } => StatusCode::BAD_REQUEST,
                AutofixError::ApplyFailed => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::DegradedMode => StatusCode::SERVICE_UNAVAILABLE,
            Self::FailoverFailed(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            Self::Gate(rejection) => {
                let message = match rejection {
                    GateRejection::AuthenticationRequired => {
                        "authentication required".to_string()
                    }
                    GateRejection::InsufficientPrivileges => {
                        "admin privileges required".to_string()
                    }
                    GateRejection::PoliciesDisabled { kind } => {
                        format!("auto-fix policy for {kind} is not enabled")
                    }
                    GateRejection::SeverityNotAllowed { severity, max } => {
                        format!("severity {severity} exceeds policy maximum {max}")
                    }
                    GateRejection::ApprovalRequired => {
                        "approvedBy attestation required".to_string()
                    }
                    GateRejection::ApprovalMismatch => {
                        "approvedBy does not match the authenticated identity".to_string()
                    }
                    GateRejection::SystemUnhealthy => {
                        "system is unhealthy; apply is blocked".to_string()
                    }
                };
                json!({ "ok": false, "error": rejection.kind(), "message": message })
            }
            Self::Autofix(error) => json!({
                "ok": false,
                "error": error.kind(),
                "message": error.to_string(),
            }),
            Self::DegradedMode => json!({
                "ok": false,
                "error": "Database temporarily unavailable",
                "mode": "degraded",
            }),
            Self::FailoverFailed(message) => json!({
                "success": false,
                "error": "Failover failed",
                "message": message,
            }),
            Self::BadRequest(message) => {
                json!({ "ok": false, "error": "bad_request", "message": message })
            }
            Self::NotFound(what) => {
                json!({ "ok": false, "error": "not_found", "message": what })
            }
            Self::Internal => {
                json!({ "ok": false, "error": "internal_error", "message": "internal error" })
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<GateRejection> for ApiError {
    fn from(rejection: GateRejection) -> Self {
        Self::Gate(rejection)
    }
}

impl From<AutofixError> for ApiError {
    fn from(error: AutofixError) -> Self {
        Self::Autofix(error)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "Database error in request handler");
        Self::Internal
    }
}

impl From<crate::error::CoreError> for ApiError {
    fn from(e: crate::error::CoreError) -> Self {
        tracing::error!(error = %e, "Core error in request handler");
        Self::Internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rejections_map_to_contract_status_codes() {
        let cases = [
            (GateRejection::AuthenticationRequired, 401),
            (GateRejection::InsufficientPrivileges, 403),
            (
                GateRejection::PoliciesDisabled {
                    kind: "X".to_string(),
                },
                423,
            ),
            (
                GateRejection::SeverityNotAllowed {
                    severity: "critical".to_string(),
                    max: "high".to_string(),
                },
                423,
            ),
            (GateRejection::ApprovalRequired, 400),
            (GateRejection::ApprovalMismatch, 403),
            (GateRejection::SystemUnhealthy, 503),
        ];
        for (rejection, expected) in cases {
            assert_eq!(ApiError::Gate(rejection).status().as_u16(), expected);
        }
    }

    #[test]
    fn degraded_body_matches_contract_shape() {
        let body = ApiError::DegradedMode.body();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "Database temporarily unavailable");
        assert_eq!(body["mode"], "degraded");
    }

    #[test]
    fn failover_failure_body_matches_contract_shape() {
        let body = ApiError::FailoverFailed("transition already in progress".to_string()).body();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failover failed");
    }

    #[test]
    fn not_open_is_conflict() {
        let error = ApiError::Autofix(AutofixError::NotOpen {
            id: 1,
            status: "APPLIED".to_string(),
        });
        assert_eq!(error.status(), StatusCode::CONFLICT);
        assert_eq!(error.body()["error"], "not_open");
    }

    #[test]
    fn internal_error_leaks_nothing() {
        let body = ApiError::Internal.body();
        assert_eq!(body["message"], "internal error");
    }
}
