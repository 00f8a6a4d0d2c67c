//! # Health Monitor
//!
//! Produces a point-in-time health verdict for the primary store and each
//! configured replica, and maintains the rolling statistics the rest of the
//! core reads: consecutive failure count, windowed success rate, latency
//! aggregates, and a bounded diagnostics ring buffer of recent probes.
//!
//! Probing runs on a single periodic task which is the sole writer of the
//! monitor state; concurrent HTTP handlers only ever take snapshots, so they
//! can never observe a torn update. Probe errors are data, not defects: they
//! are swallowed, translated into the health signal, and never propagated to
//! health-status readers.

use crate::config::ResilienceConfig;
use crate::resilience::replica::ReplicaTracker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// A round-trip check against one storage target.
///
/// Implementations must be cheap and must not panic; a failed probe is
/// reported through the `Err` variant, never thrown past the monitor.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Issue one lightweight round-trip. Returns observed latency on
    /// success, a human-readable cause on failure.
    async fn probe(&self) -> Result<Duration, String>;
}

/// Production prober backed by a SQLx pool: `SELECT 1` under a timeout.
pub struct PoolProber {
    pool: PgPool,
    timeout: Duration,
}

impl PoolProber {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl Prober for PoolProber {
    async fn probe(&self) -> Result<Duration, String> {
        let start = std::time::Instant::now();
        match tokio::time::timeout(self.timeout, sqlx::query("SELECT 1").fetch_one(&self.pool))
            .await
        {
            Ok(Ok(_)) => Ok(start.elapsed()),
            Ok(Err(e)) => Err(format!("query failed: {e}")),
            Err(_) => Err(format!("probe timed out after {:?}", self.timeout)),
        }
    }
}

/// One entry in the diagnostics ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRecord {
    pub target: String,
    pub healthy: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Rolling connection statistics over the probe window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    pub success_rate: f64,
    pub average_latency_ms: f64,
    pub recent_failures: u32,
}

/// Snapshot of the monitor's primary-store view. Cheap to clone, safe to
/// hand to any number of concurrent readers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub is_primary_healthy: bool,
    pub consecutive_failures: u32,
    pub connection_stats: ConnectionStats,
    pub last_health_check: Option<DateTime<Utc>>,
}

struct MonitorState {
    is_primary_healthy: bool,
    consecutive_failures: u32,
    /// Sliding window of primary probe outcomes, newest at the back.
    window: VecDeque<(bool, u64)>,
    diagnostics: VecDeque<ProbeRecord>,
    last_health_check: Option<DateTime<Utc>>,
}

/// Owns the health state for the primary and the replica tracker.
pub struct HealthMonitor {
    config: ResilienceConfig,
    state: RwLock<MonitorState>,
    replicas: ReplicaTracker,
}

impl HealthMonitor {
    pub fn new(config: ResilienceConfig) -> Self {
        let state = MonitorState {
            is_primary_healthy: true,
            consecutive_failures: 0,
            window: VecDeque::with_capacity(crate::constants::SUCCESS_RATE_WINDOW),
            diagnostics: VecDeque::with_capacity(config.diagnostics_buffer_size),
            last_health_check: None,
        };
        Self {
            config,
            state: RwLock::new(state),
            replicas: ReplicaTracker::new(),
        }
    }

    /// Probe the primary store. Records the outcome and returns the verdict;
    /// never errors outward.
    pub async fn probe_primary(&self, prober: &dyn Prober) -> bool {
        match prober.probe().await {
            Ok(latency) => {
                self.record_success(latency);
                true
            }
            Err(cause) => {
                warn!(target = "primary", cause = %cause, "Health probe failed");
                self.record_failure(&cause);
                false
            }
        }
    }

    /// Probe one replica and update its tracked health.
    pub async fn probe_replica(&self, id: &str, prober: &dyn Prober) -> bool {
        match prober.probe().await {
            Ok(latency) => {
                self.replicas
                    .record(id, true, latency.as_millis() as u64);
                self.push_diagnostic(id, true, latency.as_millis() as u64, None);
                true
            }
            Err(cause) => {
                warn!(target = id, cause = %cause, "Replica probe failed");
                self.replicas.record(id, false, 0);
                self.push_diagnostic(id, false, 0, Some(cause));
                false
            }
        }
    }

    /// Record a successful primary round-trip.
    pub fn record_success(&self, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        let mut state = self.state.write();
        state.consecutive_failures = 0;
        state.is_primary_healthy = true;
        state.last_health_check = Some(Utc::now());
        push_window(&mut state.window, (true, latency_ms));
        drop(state);

        self.push_diagnostic("primary", true, latency_ms, None);
        debug!(latency_ms, "Primary probe succeeded");
    }

    /// Record a failed primary round-trip. Crossing the configured
    /// consecutive-failure threshold flips `is_primary_healthy` false.
    pub fn record_failure(&self, cause: &str) {
        let mut state = self.state.write();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_health_check = Some(Utc::now());
        push_window(&mut state.window, (false, 0));
        if state.consecutive_failures >= self.config.failure_threshold {
            state.is_primary_healthy = false;
        }
        drop(state);

        self.push_diagnostic("primary", false, 0, Some(cause.to_string()));
    }

    /// Current primary health verdict.
    pub fn is_primary_healthy(&self) -> bool {
        self.state.read().is_primary_healthy
    }

    /// Consistent snapshot of primary-store statistics.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state.read();
        MonitorSnapshot {
            is_primary_healthy: state.is_primary_healthy,
            consecutive_failures: state.consecutive_failures,
            connection_stats: compute_stats(&state.window),
            last_health_check: state.last_health_check,
        }
    }

    /// Recent probe results, oldest first.
    pub fn diagnostics(&self) -> Vec<ProbeRecord> {
        self.state.read().diagnostics.iter().cloned().collect()
    }

    pub fn replicas(&self) -> &ReplicaTracker {
        &self.replicas
    }

    /// True when at least one replica probed healthy within the staleness
    /// window.
    pub fn any_replica_active(&self) -> bool {
        self.replicas
            .any_active(self.config.replica_staleness_secs)
    }

    fn push_diagnostic(&self, target: &str, healthy: bool, latency_ms: u64, error: Option<String>) {
        let mut state = self.state.write();
        if state.diagnostics.len() >= self.config.diagnostics_buffer_size {
            state.diagnostics.pop_front();
        }
        state.diagnostics.push_back(ProbeRecord {
            target: target.to_string(),
            healthy,
            latency_ms,
            error,
            checked_at: Utc::now(),
        });
    }
}

fn push_window(window: &mut VecDeque<(bool, u64)>, entry: (bool, u64)) {
    if window.len() >= crate::constants::SUCCESS_RATE_WINDOW {
        window.pop_front();
    }
    window.push_back(entry);
}

fn compute_stats(window: &VecDeque<(bool, u64)>) -> ConnectionStats {
    if window.is_empty() {
        return ConnectionStats {
            success_rate: 1.0,
            average_latency_ms: 0.0,
            recent_failures: 0,
        };
    }
    let successes = window.iter().filter(|(ok, _)| *ok).count();
    let failures = window.len() - successes;
    let average_latency_ms = if successes > 0 {
        window
            .iter()
            .filter(|(ok, _)| *ok)
            .map(|(_, ms)| *ms as f64)
            .sum::<f64>()
            / successes as f64
    } else {
        0.0
    };
    ConnectionStats {
        success_rate: successes as f64 / window.len() as f64,
        average_latency_ms,
        recent_failures: failures as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResilienceConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted prober: fails until `healthy_after` calls have happened.
    pub(crate) struct ScriptedProber {
        calls: AtomicU32,
        healthy_after: u32,
    }

    impl ScriptedProber {
        pub(crate) fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                healthy_after: u32::MAX,
            }
        }

        pub(crate) fn healthy() -> Self {
            Self {
                calls: AtomicU32::new(0),
                healthy_after: 0,
            }
        }

        pub(crate) fn recovering_after(n: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                healthy_after: n,
            }
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self) -> Result<Duration, String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.healthy_after {
                Ok(Duration::from_millis(5))
            } else {
                Err("connection refused".to_string())
            }
        }
    }

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(ResilienceConfig::default())
    }

    #[tokio::test]
    async fn threshold_failures_flip_primary_unhealthy() {
        let monitor = monitor();
        let prober = ScriptedProber::failing();

        assert!(monitor.is_primary_healthy());
        for _ in 0..3 {
            monitor.probe_primary(&prober).await;
        }
        assert!(!monitor.is_primary_healthy());
        assert_eq!(monitor.snapshot().consecutive_failures, 3);
    }

    #[tokio::test]
    async fn below_threshold_failures_keep_primary_healthy() {
        let monitor = monitor();
        let prober = ScriptedProber::failing();

        monitor.probe_primary(&prober).await;
        monitor.probe_primary(&prober).await;
        assert!(monitor.is_primary_healthy());
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let monitor = monitor();
        monitor.probe_primary(&ScriptedProber::failing()).await;
        monitor.probe_primary(&ScriptedProber::failing()).await;
        monitor.probe_primary(&ScriptedProber::healthy()).await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(snapshot.is_primary_healthy);
    }

    #[tokio::test]
    async fn recovery_restores_health_after_outage() {
        let monitor = monitor();
        let prober = ScriptedProber::recovering_after(4);
        for _ in 0..4 {
            monitor.probe_primary(&prober).await;
        }
        assert!(!monitor.is_primary_healthy());
        monitor.probe_primary(&prober).await;
        assert!(monitor.is_primary_healthy());
    }

    #[tokio::test]
    async fn diagnostics_buffer_drops_oldest_on_overflow() {
        let mut config = ResilienceConfig::default();
        config.diagnostics_buffer_size = 4;
        let monitor = HealthMonitor::new(config);
        let prober = ScriptedProber::healthy();

        for _ in 0..6 {
            monitor.probe_primary(&prober).await;
        }
        let diagnostics = monitor.diagnostics();
        assert_eq!(diagnostics.len(), 4);
        assert!(diagnostics.iter().all(|r| r.healthy));
    }

    #[tokio::test]
    async fn success_rate_reflects_window() {
        let monitor = monitor();
        monitor.probe_primary(&ScriptedProber::healthy()).await;
        monitor.probe_primary(&ScriptedProber::failing()).await;
        monitor.probe_primary(&ScriptedProber::healthy()).await;
        monitor.probe_primary(&ScriptedProber::healthy()).await;

        let stats = monitor.snapshot().connection_stats;
        assert!((stats.success_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(stats.recent_failures, 1);
        assert!(stats.average_latency_ms > 0.0);
    }

    #[tokio::test]
    async fn replica_probe_updates_tracker() {
        let monitor = monitor();
        monitor
            .probe_replica("replica-east", &ScriptedProber::healthy())
            .await;
        assert!(monitor.any_replica_active());

        monitor
            .probe_replica("replica-east", &ScriptedProber::failing())
            .await;
        assert!(!monitor.any_replica_active());
    }
}
