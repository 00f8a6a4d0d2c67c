//! # Approval Gate Chain
//!
//! Ordered checks applied to every mutating apply/batch request. Each gate
//! short-circuits on failure and a request failing several gates reports the
//! earliest one; callers depend on that ordering, so it is a contract here,
//! not an implementation detail.
//!
//! 1. Authentication - caller must be an authenticated principal
//! 2. Authorization - principal must hold the admin role
//! 3. Policy - the suggestion's kind must have an enabled policy allowing
//!    its severity
//! 4. Approval - an attestation must be supplied and must case-exactly
//!    match the authenticated principal's identity
//! 5. Health - the live system health signal, re-checked fresh, always last

use crate::models::policy::Policy;
use crate::models::suggestion::{Severity, Suggestion};
use crate::resilience::ModeController;
use crate::web::auth::AuthPrincipal;
use std::sync::Arc;
use tracing::debug;

/// A gate rejection. Stable kind strings and status codes; surfaced
/// verbatim to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRejection {
    AuthenticationRequired,
    InsufficientPrivileges,
    PoliciesDisabled { kind: String },
    SeverityNotAllowed { severity: String, max: String },
    ApprovalRequired,
    ApprovalMismatch,
    SystemUnhealthy,
}

impl GateRejection {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::InsufficientPrivileges => "insufficient_privileges",
            Self::PoliciesDisabled { .. } => "policies_disabled",
            Self::SeverityNotAllowed { .. } => "severity_not_allowed",
            Self::ApprovalRequired => "approval_required",
            Self::ApprovalMismatch => "approval_mismatch",
            Self::SystemUnhealthy => "system_unhealthy",
        }
    }
}

/// What the caller supplied with the apply request.
#[derive(Debug, Clone, Default)]
pub struct ApplyRequest {
    pub principal: Option<AuthPrincipal>,
    pub approved_by: Option<String>,
}

/// The ordered gate chain. Holds the live health signal; everything else
/// arrives per-request.
pub struct ApprovalGateChain {
    controller: Arc<ModeController>,
}

impl ApprovalGateChain {
    pub fn new(controller: Arc<ModeController>) -> Self {
        Self { controller }
    }

    /// Gates 1 and 2 alone: authentication, then authorization. Handlers
    /// run this before touching the store so an unauthenticated request is
    /// answered with the earliest gate's code even when the suggestion does
    /// not exist.
    pub fn authenticate<'a>(
        &self,
        request: &'a ApplyRequest,
    ) -> Result<&'a AuthPrincipal, GateRejection> {
        let principal = request
            .principal
            .as_ref()
            .ok_or(GateRejection::AuthenticationRequired)?;
        if !principal.is_admin() {
            return Err(GateRejection::InsufficientPrivileges);
        }
        Ok(principal)
    }

    /// Run every gate in order against one suggestion. Returns the approved
    /// identity on success.
    pub fn evaluate(
        &self,
        request: &ApplyRequest,
        suggestion: &Suggestion,
        policy: Option<&Policy>,
    ) -> Result<String, GateRejection> {
        // Gate 1: authentication
        let principal = request
            .principal
            .as_ref()
            .ok_or(GateRejection::AuthenticationRequired)?;

        // Gate 2: authorization
        if !principal.is_admin() {
            return Err(GateRejection::InsufficientPrivileges);
        }

        // Gate 3: policy
        let policy = policy.filter(|p| p.auto_fix_enabled).ok_or_else(|| {
            GateRejection::PoliciesDisabled {
                kind: suggestion.kind.clone(),
            }
        })?;
        let severity: Severity =
            suggestion
                .severity()
                .map_err(|_| GateRejection::SeverityNotAllowed {
                    severity: suggestion.severity.clone(),
                    max: policy.auto_fix_max_severity.clone(),
                })?;
        if !policy.allows(severity) {
            return Err(GateRejection::SeverityNotAllowed {
                severity: suggestion.severity.clone(),
                max: policy.auto_fix_max_severity.clone(),
            });
        }

        // Gate 4: explicit approval, identity must match exactly
        let approved_by = request
            .approved_by
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(GateRejection::ApprovalRequired)?;
        if approved_by != principal.identity() {
            return Err(GateRejection::ApprovalMismatch);
        }

        // Gate 5: live health, always last, never cached
        if !self.controller.is_system_healthy() {
            return Err(GateRejection::SystemUnhealthy);
        }

        debug!(
            suggestion_id = suggestion.id,
            kind = %suggestion.kind,
            approved_by = approved_by,
            "Apply request cleared all gates"
        );
        Ok(approved_by.to_string())
    }
}
