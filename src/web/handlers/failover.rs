//! # Failover Handlers
//!
//! HTTP surface of the mode controller: status, health scoring, manual
//! triggers, forced reconnect, history, rules, metrics and diagnostics.

use crate::resilience::{RuleUpdate, StorageMode};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// GET /failover/status
pub async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let storage = state.controller.health_status();
    let staleness = state.config.resilience.replica_staleness_secs;

    // While healthy, keep a last-known-good copy in the degraded cache;
    // memory-backed modes serve it alongside the live (cache-only) view.
    let storage_value = serde_json::to_value(&storage).unwrap_or(Value::Null);
    if storage.is_primary_healthy {
        state.cache.put("status:last_known_good", storage_value.clone());
    }
    let last_known_good = if storage.mode.is_memory_backed() {
        state.cache.get("status:last_known_good")
    } else {
        None
    };

    let replicas: Vec<Value> = state
        .controller
        .replica_status()
        .into_iter()
        .map(|(id, health)| {
            json!({
                "id": id,
                "healthy": health.healthy,
                "latencyMs": health.latency_ms,
                "lastChecked": health.last_checked,
                "active": health.is_active(staleness),
            })
        })
        .collect();

    let orchestration = match &state.orchestration {
        Some(source) => json!({
            "available": true,
            "executions": source.recent_executions(10),
        }),
        None => json!({ "available": false }),
    };

    let mut response = json!({
        "storage": storage_value,
        "replicas": replicas,
        "orchestration": orchestration,
        "failoverHistory": state.controller.failover_history(20),
    });
    if let Some(snapshot) = last_known_good {
        response["lastKnownGood"] = snapshot;
    }
    Json(response)
}

/// GET /failover/health
pub async fn get_health(State(state): State<AppState>) -> Json<Value> {
    let status = state.controller.health_status();
    let replica_active = state.monitor.any_replica_active();

    let mut score: i64 = 100;
    let mut factors = Vec::new();
    let mut recommendations = Vec::new();

    if !status.is_primary_healthy {
        score -= 40;
        factors.push(json!({
            "name": "primary_connectivity",
            "status": "failing",
            "impact": -40,
        }));
        recommendations.push("investigate primary store connectivity".to_string());
    }
    let failure_penalty = i64::from(status.consecutive_failures.min(5)) * 5;
    if failure_penalty > 0 {
        score -= failure_penalty;
        factors.push(json!({
            "name": "consecutive_failures",
            "status": format!("{} recent consecutive failures", status.consecutive_failures),
            "impact": -failure_penalty,
        }));
    }
    if status.connection_stats.success_rate < 0.9 {
        score -= 15;
        factors.push(json!({
            "name": "success_rate",
            "status": format!("{:.0}% over probe window", status.connection_stats.success_rate * 100.0),
            "impact": -15,
        }));
        recommendations.push("probe success rate is below 90%".to_string());
    }
    if !status.mode.is_writable() {
        score -= 20;
        factors.push(json!({
            "name": "storage_mode",
            "status": status.mode.to_string(),
            "impact": -20,
        }));
        recommendations.push(format!(
            "storage is in {} mode; writes are rejected",
            status.mode
        ));
    }
    if !status.mode.is_durable() {
        recommendations
            .push("no durable store; data is limited to the in-memory cache".to_string());
    }
    if status.is_read_only {
        score -= 10;
        factors.push(json!({
            "name": "read_only_override",
            "status": "engaged",
            "impact": -10,
        }));
        recommendations.push("clear the read-only override once maintenance ends".to_string());
    }
    if !status.is_primary_healthy && !replica_active {
        recommendations.push("no active replica; reads depend on the memory cache".to_string());
    }
    let score = score.max(0);

    let verdict = match score {
        90..=100 => "excellent",
        70..=89 => "good",
        40..=69 => "degraded",
        _ => "critical",
    };

    Json(json!({
        "healthScore": score,
        "status": verdict,
        "factors": factors,
        "recommendations": recommendations,
        "metrics": {
            "connectionStats": status.connection_stats,
            "consecutiveFailures": status.consecutive_failures,
            "lastHealthCheck": status.last_health_check,
            "mode": status.mode,
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub target_mode: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /failover/trigger
pub async fn post_trigger(
    State(state): State<AppState>,
    Json(body): Json<TriggerRequest>,
) -> ApiResult<Json<Value>> {
    let target: StorageMode = body
        .target_mode
        .parse()
        .map_err(ApiError::FailoverFailed)?;
    let reason = body.reason.unwrap_or_else(|| "manual trigger".to_string());

    let outcome = state.controller.trigger_manual_failover(target, &reason);
    if !outcome.success {
        return Err(ApiError::FailoverFailed(
            outcome.error.unwrap_or_else(|| "unknown".to_string()),
        ));
    }

    info!(target_mode = %target, reason = %reason, "Manual failover executed");
    Ok(Json(json!({
        "success": true,
        "targetMode": target,
        "reason": reason,
    })))
}

/// POST /failover/reconnect
pub async fn post_reconnect(State(state): State<AppState>) -> Json<Value> {
    let outcome = state
        .controller
        .force_reconnect(state.primary_prober.as_ref())
        .await;
    Json(serde_json::to_value(outcome).unwrap_or_else(|_| json!({ "success": false })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    50
}

/// GET /failover/history
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let events = state.controller.failover_history(query.limit);
    let automatic = events
        .iter()
        .filter(|e| e.trigger == crate::constants::triggers::AUTOMATIC_RULE)
        .count();
    let manual = events.len() - automatic;

    let orchestration_executions = state
        .orchestration
        .as_ref()
        .map(|source| source.recent_executions(query.limit))
        .unwrap_or_default();

    Json(json!({
        "failoverEvents": events,
        "orchestrationExecutions": orchestration_executions,
        "summary": {
            "total": events.len(),
            "automatic": automatic,
            "manual": manual,
            "currentMode": state.controller.mode(),
        },
    }))
}

/// GET /failover/rules
pub async fn get_rules(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "rules": state.controller.rules() }))
}

/// PUT /failover/rules/{id}
pub async fn put_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<RuleUpdate>,
) -> ApiResult<Json<Value>> {
    let rule = state
        .controller
        .update_rule(&id, update)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(json!({ "rule": rule })))
}

/// GET /failover/metrics
pub async fn get_metrics(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.monitor.snapshot();
    let staleness = state.config.resilience.replica_staleness_secs;
    let replicas: Vec<Value> = state
        .controller
        .replica_status()
        .into_iter()
        .map(|(id, health)| {
            json!({
                "id": id,
                "healthy": health.healthy,
                "latencyMs": health.latency_ms,
                "active": health.is_active(staleness),
            })
        })
        .collect();

    Json(json!({
        "mode": state.controller.mode(),
        "primary": snapshot,
        "replicas": replicas,
        "degradedCacheEntries": state.cache.len(),
    }))
}

/// GET /failover/diagnostics
pub async fn get_diagnostics(State(state): State<AppState>) -> Json<Value> {
    let probes = state.monitor.diagnostics();
    Json(json!({
        "bufferSize": state.config.resilience.diagnostics_buffer_size,
        "entries": probes.len(),
        "probes": probes,
    }))
}
