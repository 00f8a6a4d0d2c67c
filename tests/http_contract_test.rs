//! HTTP contract tests: status codes and response shapes the dashboard and
//! its middleware depend on. Runs against mock probers and a lazy pool, so
//! no live Postgres is required; store-backed paths are covered by the
//! degraded responses that short-circuit ahead of any query.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use ballotline_core::config::{AuthConfig, CoreConfig};
use ballotline_core::resilience::{HealthMonitor, ModeController, Prober};
use ballotline_core::web::auth::JwtAuthenticator;
use ballotline_core::web::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct HealthyProbe;

#[async_trait]
impl Prober for HealthyProbe {
    async fn probe(&self) -> Result<Duration, String> {
        Ok(Duration::from_millis(3))
    }
}

struct DownProbe;

#[async_trait]
impl Prober for DownProbe {
    async fn probe(&self) -> Result<Duration, String> {
        Err("connection refused".to_string())
    }
}

struct Harness {
    state: AppState,
    authenticator: JwtAuthenticator,
}

impl Harness {
    fn new(primary: Arc<dyn Prober>) -> Self {
        let mut config = CoreConfig::default();
        config.web.auth = AuthConfig {
            enabled: true,
            jwt_secret: "integration-test-secret".to_string(),
            ..AuthConfig::default()
        };
        config.resilience.reconnect_backoff_ms = 1;

        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/ballotline_test")
            .expect("lazy pool");
        let monitor = Arc::new(HealthMonitor::new(config.resilience.clone()));
        let controller = ModeController::new(Arc::clone(&monitor), config.resilience.clone());
        let authenticator = JwtAuthenticator::from_config(&config.web.auth).unwrap();

        let state = AppState::new(
            config,
            pool,
            monitor,
            controller,
            primary,
            Some(Arc::new(authenticator.clone())),
            None,
        );
        Self {
            state,
            authenticator,
        }
    }

    fn admin_token(&self) -> String {
        self.authenticator
            .generate_token("u-1", "admin@admin.com", vec!["admin".to_string()])
            .unwrap()
    }

    fn viewer_token(&self) -> String {
        self.authenticator
            .generate_token("u-2", "viewer@example.com", vec!["viewer".to_string()])
            .unwrap()
    }

    fn degrade_primary(&self) {
        for _ in 0..3 {
            self.state.monitor.record_failure("simulated outage");
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

fn post_json(path: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn apply_without_auth_is_401_even_when_everything_else_is_wrong() {
    let harness = Harness::new(Arc::new(DownProbe));
    harness.degrade_primary();
    harness.state.controller.set_read_only(true);

    let (status, body) = harness
        .send(post_json("/autofix/apply/123", None, serde_json::json!({})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication_required");
}

#[tokio::test]
async fn apply_as_non_admin_is_403() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    let token = harness.viewer_token();

    let (status, body) = harness
        .send(post_json(
            "/autofix/apply/123",
            Some(&token),
            serde_json::json!({ "approvedBy": "viewer@example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "insufficient_privileges");
}

#[tokio::test]
async fn garbage_token_is_equivalent_to_no_auth() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    let (status, body) = harness
        .send(post_json(
            "/autofix/apply/123",
            Some("not-a-real-token"),
            serde_json::json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication_required");
}

#[tokio::test]
async fn candidates_answer_degraded_503_when_primary_is_down() {
    let harness = Harness::new(Arc::new(DownProbe));
    harness.degrade_primary();

    let (status, body) = harness.send(get("/autofix/candidates")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Database temporarily unavailable");
    assert_eq!(body["mode"], "degraded");
}

#[tokio::test]
async fn preview_answers_degraded_503_when_primary_is_down() {
    let harness = Harness::new(Arc::new(DownProbe));
    harness.degrade_primary();

    let (status, body) = harness.send(get("/autofix/preview/7")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["mode"], "degraded");
}

#[tokio::test]
async fn manual_trigger_with_unknown_mode_is_400_with_contract_shape() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    let (status, body) = harness
        .send(post_json(
            "/failover/trigger",
            None,
            serde_json::json!({ "targetMode": "warp_drive" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failover failed");
}

#[tokio::test]
async fn manual_trigger_transitions_mode_and_records_history() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    let (status, body) = harness
        .send(post_json(
            "/failover/trigger",
            None,
            serde_json::json!({ "targetMode": "read_only", "reason": "maintenance" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["targetMode"], "read_only");
    assert_eq!(body["reason"], "maintenance");

    let (status, body) = harness.send(get("/failover/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"]["mode"], "read_only");
    assert_eq!(body["orchestration"]["available"], false);

    let (status, body) = harness.send(get("/failover/history?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["manual"], 1);
    assert_eq!(body["failoverEvents"][0]["toMode"], "read_only");
}

#[tokio::test]
async fn reconnect_reports_bounded_attempts_on_persistent_outage() {
    let harness = Harness::new(Arc::new(DownProbe));
    let (status, body) = harness
        .send(post_json("/failover/reconnect", None, serde_json::json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["attempts"], 5);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn reconnect_restores_database_mode_when_primary_returns() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    harness
        .state
        .controller
        .trigger_manual_failover(ballotline_core::resilience::StorageMode::Replica, "test");

    let (status, body) = harness
        .send(post_json("/failover/reconnect", None, serde_json::json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["attempts"], 1);

    let (_, body) = harness.send(get("/failover/status")).await;
    assert_eq!(body["storage"]["mode"], "database");
}

#[tokio::test]
async fn rules_are_listed_and_updatable() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    let (status, body) = harness.send(get("/failover/rules")).await;
    assert_eq!(status, StatusCode::OK);
    let rules = body["rules"].as_array().unwrap();
    assert!(rules.iter().any(|r| r["id"] == "primary-outage"));

    let put = Request::builder()
        .method("PUT")
        .uri("/failover/rules/primary-outage")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "enabled": false, "cooldownMs": 120000 }).to_string(),
        ))
        .unwrap();
    let (status, body) = harness.send(put).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rule"]["enabled"], false);
    assert_eq!(body["rule"]["cooldownMs"], 120000);

    let put_unknown = Request::builder()
        .method("PUT")
        .uri("/failover/rules/no-such-rule")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "enabled": true }).to_string()))
        .unwrap();
    let (status, _) = harness.send(put_unknown).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_endpoint_scores_a_healthy_system_high() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    harness
        .state
        .monitor
        .record_success(Duration::from_millis(4));

    let (status, body) = harness.send(get("/failover/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthScore"], 100);
    assert_eq!(body["status"], "excellent");
}

#[tokio::test]
async fn health_endpoint_degrades_score_and_explains_why() {
    let harness = Harness::new(Arc::new(DownProbe));
    harness.degrade_primary();
    harness
        .state
        .controller
        .trigger_manual_failover(ballotline_core::resilience::StorageMode::Replica, "outage");

    let (status, body) = harness.send(get("/failover/health")).await;
    assert_eq!(status, StatusCode::OK);
    let score = body["healthScore"].as_i64().unwrap();
    assert!(score < 70, "expected degraded score, got {score}");
    assert!(!body["factors"].as_array().unwrap().is_empty());
    assert!(!body["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn diagnostics_expose_the_probe_ring_buffer() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    harness
        .state
        .monitor
        .record_success(Duration::from_millis(2));
    harness.state.monitor.record_failure("blip");

    let (status, body) = harness.send(get("/failover/diagnostics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"], 2);
    let probes = body["probes"].as_array().unwrap();
    assert_eq!(probes[0]["healthy"], true);
    assert_eq!(probes[1]["healthy"], false);
    assert_eq!(probes[1]["error"], "blip");
}

#[tokio::test]
async fn metrics_report_mode_and_primary_snapshot() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    let (status, body) = harness.send(get("/failover/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "database");
    assert_eq!(body["primary"]["isPrimaryHealthy"], true);
}

#[tokio::test]
async fn policy_update_is_blocked_by_the_write_guard_in_read_only() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    harness.state.controller.set_read_only(true);
    let token = harness.admin_token();

    let put = Request::builder()
        .method("PUT")
        .uri("/autofix/policies/CONGRESS_MISMATCH")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(
            serde_json::json!({ "autoFixEnabled": true }).to_string(),
        ))
        .unwrap();
    let (status, body) = harness.send(put).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["mode"], "degraded");
}

#[tokio::test]
async fn batch_requires_admin_before_touching_anything() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    let (status, body) = harness
        .send(post_json(
            "/autofix/batch",
            None,
            serde_json::json!({ "ids": [1, 2, 3] }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication_required");
}

#[tokio::test]
async fn empty_batch_is_rejected_as_bad_request() {
    let harness = Harness::new(Arc::new(HealthyProbe));
    let token = harness.admin_token();
    let (status, body) = harness
        .send(post_json(
            "/autofix/batch",
            Some(&token),
            serde_json::json!({ "ids": [] }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn detect_requires_admin_and_then_availability() {
    let harness = Harness::new(Arc::new(DownProbe));
    harness.degrade_primary();

    // Unauthenticated: the auth gate answers first.
    let (status, _) = harness
        .send(post_json("/autofix/detect", None, serde_json::json!({})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Authenticated admin against a down store: degraded, not partial data.
    let token = harness.admin_token();
    let (status, body) = harness
        .send(post_json("/autofix/detect", Some(&token), serde_json::json!({})))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["mode"], "degraded");
}
