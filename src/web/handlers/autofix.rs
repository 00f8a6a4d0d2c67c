//! # Auto-Fix Handlers
//!
//! Detection/preview reads and the gated apply/batch mutations.
//!
//! Reads consult the live health signal first: when the store is
//! unavailable they answer 503 with the degraded shape rather than mixing
//! partial data into a 200. Mutations run the full gate chain; the earliest
//! failing gate's status code wins, with health checked fresh as the last
//! gate.

use crate::autofix::gates::ApplyRequest;
use crate::models::policy::{Policy, PolicyUpdate};
use crate::models::suggestion::Suggestion;
use crate::models::task_run::BotTaskRun;
use crate::web::auth::CallerIdentity;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

fn require_available(state: &AppState) -> ApiResult<()> {
    if !state.controller.is_database_available() {
        return Err(ApiError::DegradedMode);
    }
    Ok(())
}

fn apply_request(identity: CallerIdentity, approved_by: Option<String>) -> ApplyRequest {
    ApplyRequest {
        principal: identity.0,
        approved_by,
    }
}

#[derive(Debug, Deserialize)]
pub struct CandidatesQuery {
    #[serde(default = "default_candidates_limit")]
    pub limit: i64,
}

fn default_candidates_limit() -> i64 {
    100
}

/// GET /autofix/candidates
pub async fn get_candidates(
    State(state): State<AppState>,
    Query(query): Query<CandidatesQuery>,
) -> ApiResult<Json<Value>> {
    require_available(&state)?;
    let items = Suggestion::list_open(&state.pool, query.limit).await?;
    Ok(Json(json!({
        "ok": true,
        "mode": state.controller.mode(),
        "items": items,
    })))
}

/// GET /autofix/preview/{id}
pub async fn get_preview(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    require_available(&state)?;
    let suggestion = Suggestion::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("suggestion {id}")))?;

    let action = state.remediator.preview(&suggestion)?;
    Ok(Json(json!({
        "ok": true,
        "mode": state.controller.mode(),
        "preview": {
            "id": suggestion.id,
            "kind": suggestion.kind,
            "severity": suggestion.severity,
            "message": suggestion.message,
            "action": action,
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyBody {
    pub approved_by: Option<String>,
}

/// POST /autofix/apply/{id}
pub async fn post_apply(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<ApplyBody>,
) -> ApiResult<Json<Value>> {
    let request = apply_request(identity, body.approved_by);

    // Gates 1-2 answer before any store access so a missing suggestion can
    // never mask an authentication failure.
    state.gates.authenticate(&request)?;

    let suggestion = Suggestion::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("suggestion {id}")))?;
    let policy = Policy::find_by_kind(&state.pool, &suggestion.kind).await?;

    let approved_by = state
        .gates
        .evaluate(&request, &suggestion, policy.as_ref())?;
    let outcome = state.remediator.apply(id, &approved_by).await?;

    Ok(Json(json!({
        "ok": true,
        "status": "applied",
        "approvedBy": outcome.approved_by,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBody {
    pub ids: Vec<i64>,
    pub approved_by: Option<String>,
}

/// POST /autofix/batch
pub async fn post_batch(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<BatchBody>,
) -> ApiResult<Json<Value>> {
    let request = apply_request(identity, body.approved_by);
    state.gates.authenticate(&request)?;

    if body.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".to_string()));
    }
    if body.ids.len() > state.config.autofix.batch_apply_limit {
        return Err(ApiError::BadRequest(format!(
            "batch size exceeds limit of {}",
            state.config.autofix.batch_apply_limit
        )));
    }

    // Per-suggestion gates and apply; one failure never aborts the batch.
    let mut applied = Vec::new();
    let mut failed = Vec::new();
    for id in body.ids {
        let result = async {
            let suggestion = Suggestion::find_by_id(&state.pool, id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("suggestion {id}")))?;
            let policy = Policy::find_by_kind(&state.pool, &suggestion.kind).await?;
            let approved_by = state
                .gates
                .evaluate(&request, &suggestion, policy.as_ref())?;
            let outcome = state.remediator.apply(id, &approved_by).await?;
            Ok::<_, ApiError>(outcome)
        }
        .await;

        match result {
            Ok(outcome) => applied.push(outcome.id),
            Err(e) => failed.push(json!({ "id": id, "error": error_kind(&e) })),
        }
    }

    info!(
        applied = applied.len(),
        failed = failed.len(),
        "Batch apply complete"
    );
    Ok(Json(json!({
        "ok": true,
        "applied": applied,
        "failed": failed,
    })))
}

/// POST /autofix/detect
pub async fn post_detect(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> ApiResult<Json<Value>> {
    let request = apply_request(identity, None);
    state.gates.authenticate(&request)?;
    require_available(&state)?;

    let report = state.engine.run_detection("api").await?;
    Ok(Json(json!({
        "ok": true,
        "runId": report.run_id,
        "created": report.created,
        "tasks": report.tasks,
    })))
}

/// GET /autofix/policies
pub async fn get_policies(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    require_available(&state)?;
    let policies = Policy::list_all(&state.pool).await?;
    Ok(Json(json!({ "ok": true, "policies": policies })))
}

/// GET /autofix/runs
pub async fn get_runs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    require_available(&state)?;
    let runs = BotTaskRun::recent(&state.pool, 20).await?;
    Ok(Json(json!({ "ok": true, "runs": runs })))
}

/// PUT /autofix/policies/{kind}
pub async fn put_policy(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Extension(identity): Extension<CallerIdentity>,
    Json(update): Json<PolicyUpdate>,
) -> ApiResult<Json<Value>> {
    let request = apply_request(identity, None);
    state.gates.authenticate(&request)?;

    let policy = Policy::update(&state.pool, &kind, update)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("policy {kind}")))?;
    info!(kind = %kind, enabled = policy.auto_fix_enabled, "Policy updated");
    Ok(Json(json!({ "ok": true, "policy": policy })))
}

fn error_kind(error: &ApiError) -> String {
    match error {
        ApiError::Gate(rejection) => rejection.kind().to_string(),
        ApiError::Autofix(e) => e.kind().to_string(),
        ApiError::DegradedMode => "degraded".to_string(),
        ApiError::NotFound(_) => "not_found".to_string(),
        ApiError::BadRequest(_) => "bad_request".to_string(),
        ApiError::FailoverFailed(_) => "failover_failed".to_string(),
        ApiError::Internal => "internal_error".to_string(),
    }
}
