//! # Mode Controller (Failover Orchestrator)
//!
//! Owns the authoritative storage mode, evaluates failover rules on every
//! monitor tick, executes manual and automatic transitions, and records the
//! append-only failover event history.
//!
//! ## Transition exclusivity
//!
//! At most one transition is in flight at any instant. Automatic rule
//! evaluation, a manual trigger, and a forced reconnect all contend on the
//! same `tokio::sync::Mutex` via `try_lock`; the loser fails fast rather
//! than queueing, which is what prevents oscillation under concurrent
//! triggers. Read accessors never touch the transition lock.

use crate::config::ResilienceConfig;
use crate::constants::triggers;
use crate::error::CoreError;
use crate::resilience::health_monitor::{ConnectionStats, HealthMonitor, Prober};
use crate::resilience::modes::StorageMode;
use crate::resilience::replica::ReplicaHealth;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Condition under which a failover rule fires, evaluated against the
/// current health snapshot and replica availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleTrigger {
    /// Primary marked unhealthy by the monitor.
    PrimaryUnhealthy,
    /// Primary unhealthy and no replica active within the staleness window.
    PrimaryAndReplicasUnhealthy,
    /// Primary healthy again while the machine is away from `database`.
    PrimaryRecovered,
    /// Windowed success rate dropped below the threshold.
    SuccessRateBelow { threshold: f64 },
}

/// A failover rule. Rules are evaluated in ascending `priority` order; a
/// rule that fired cannot fire again until `cooldown_ms` has elapsed since
/// `last_triggered`. Mutated only through [`ModeController::update_rule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverRule {
    pub id: String,
    pub name: String,
    pub trigger: RuleTrigger,
    pub target_mode: StorageMode,
    pub priority: u32,
    pub enabled: bool,
    pub cooldown_ms: u64,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl FailoverRule {
    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered {
            Some(fired_at) => {
                (now - fired_at).num_milliseconds() < self.cooldown_ms as i64
            }
            None => false,
        }
    }
}

/// Partial update applied to one rule. Absent fields keep current values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub trigger: Option<RuleTrigger>,
    pub target_mode: Option<StorageMode>,
    pub priority: Option<u32>,
    pub enabled: Option<bool>,
    pub cooldown_ms: Option<u64>,
}

/// Immutable audit record of one mode transition. Appended on every
/// transition, manual or automatic; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverEvent {
    pub timestamp: DateTime<Utc>,
    pub from_mode: StorageMode,
    pub to_mode: StorageMode,
    pub trigger: String,
    pub reason: String,
    pub success: bool,
}

/// Result of a manual failover request.
#[derive(Debug, Clone, Serialize)]
pub struct ManualFailoverOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a forced reconnect attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ReconnectOutcome {
    pub success: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Composed health view: monitor statistics plus the controller's mode and
/// overrides. Exactly one mode is active at any instant and `is_read_only`
/// always wins over mode writability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub mode: StorageMode,
    pub is_primary_healthy: bool,
    pub is_read_only: bool,
    pub is_memory_optimized: bool,
    pub consecutive_failures: u32,
    pub connection_stats: ConnectionStats,
    pub last_health_check: Option<DateTime<Utc>>,
}

/// The failover orchestrator.
pub struct ModeController {
    monitor: Arc<HealthMonitor>,
    config: ResilienceConfig,
    mode: RwLock<StorageMode>,
    read_only: AtomicBool,
    rules: RwLock<Vec<FailoverRule>>,
    history: RwLock<VecDeque<FailoverEvent>>,
    transition_lock: Mutex<()>,
}

impl ModeController {
    pub fn new(monitor: Arc<HealthMonitor>, config: ResilienceConfig) -> Arc<Self> {
        Arc::new(Self {
            monitor,
            config,
            mode: RwLock::new(StorageMode::Database),
            read_only: AtomicBool::new(false),
            rules: RwLock::new(default_rules()),
            history: RwLock::new(VecDeque::with_capacity(
                crate::constants::FAILOVER_HISTORY_SIZE,
            )),
            transition_lock: Mutex::new(()),
        })
    }

    /// Current storage mode.
    pub fn mode(&self) -> StorageMode {
        *self.mode.read()
    }

    /// Explicit read-only lockdown. Independent from the mode and always
    /// wins: writes stay rejected until the override clears, whatever the
    /// mode says.
    pub fn set_read_only(&self, value: bool) {
        self.read_only.store(value, Ordering::Release);
        info!(read_only = value, "Read-only override changed");
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Single source of truth consulted by the write guard.
    pub fn writes_allowed(&self) -> bool {
        !self.is_read_only() && self.mode().is_writable()
    }

    /// Live health verdict for the apply pipeline's final gate: primary
    /// reachable and the system currently accepting writes.
    pub fn is_system_healthy(&self) -> bool {
        self.monitor.is_primary_healthy() && self.writes_allowed()
    }

    /// Whether read endpoints can serve live data instead of a degraded
    /// response.
    pub fn is_database_available(&self) -> bool {
        self.monitor.is_primary_healthy()
    }

    /// Composed health snapshot. Safe to call concurrently with transitions;
    /// never blocks on an in-flight transition.
    pub fn health_status(&self) -> HealthStatus {
        let snapshot = self.monitor.snapshot();
        let mode = self.mode();
        HealthStatus {
            mode,
            is_primary_healthy: snapshot.is_primary_healthy,
            is_read_only: self.is_read_only(),
            is_memory_optimized: mode.is_memory_backed(),
            consecutive_failures: snapshot.consecutive_failures,
            connection_stats: snapshot.connection_stats,
            last_health_check: snapshot.last_health_check,
        }
    }

    /// Per-replica health, sorted by replica id.
    pub fn replica_status(&self) -> Vec<(String, ReplicaHealth)> {
        self.monitor.replicas().snapshot()
    }

    /// Most recent failover events, newest first, capped at `limit`.
    pub fn failover_history(&self, limit: usize) -> Vec<FailoverEvent> {
        self.history
            .read()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn rules(&self) -> Vec<FailoverRule> {
        self.rules.read().clone()
    }

    /// Apply a partial update to one rule. Rules are never created
    /// implicitly; updating an unknown id is an error.
    pub fn update_rule(&self, id: &str, update: RuleUpdate) -> Result<FailoverRule, CoreError> {
        let mut rules = self.rules.write();
        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| CoreError::Configuration(format!("unknown failover rule: {id}")))?;

        if let Some(name) = update.name {
            rule.name = name;
        }
        if let Some(trigger) = update.trigger {
            rule.trigger = trigger;
        }
        if let Some(target_mode) = update.target_mode {
            rule.target_mode = target_mode;
        }
        if let Some(priority) = update.priority {
            rule.priority = priority;
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }
        if let Some(cooldown_ms) = update.cooldown_ms {
            rule.cooldown_ms = cooldown_ms;
        }
        info!(rule_id = id, "Failover rule updated");
        Ok(rule.clone())
    }

    /// Evaluate enabled rules in ascending priority order and fire the first
    /// match. Called on every monitor tick. Returns the recorded event when
    /// a rule fired. Skips silently when a transition is already in flight.
    pub fn evaluate_rules(&self) -> Option<FailoverEvent> {
        let _guard = self.transition_lock.try_lock().ok()?;

        let now = Utc::now();
        let snapshot = self.monitor.snapshot();
        let replica_active = self.monitor.any_replica_active();
        let current_mode = self.mode();

        let fired = {
            let mut rules = self.rules.write();
            rules.sort_by_key(|r| r.priority);
            let rule = rules.iter_mut().find(|rule| {
                rule.enabled
                    && !rule.in_cooldown(now)
                    && rule.target_mode != current_mode
                    && trigger_matches(
                        &rule.trigger,
                        &snapshot.connection_stats,
                        snapshot.is_primary_healthy,
                        replica_active,
                        current_mode,
                    )
            })?;
            rule.last_triggered = Some(now);
            rule.clone()
        };

        let event = self.apply_transition(
            fired.target_mode,
            triggers::AUTOMATIC_RULE,
            &format!("rule '{}' fired", fired.name),
        );
        Some(event)
    }

    /// Bypass rule evaluation and transition directly. Fails fast when a
    /// transition is already in progress.
    pub fn trigger_manual_failover(
        &self,
        target: StorageMode,
        reason: &str,
    ) -> ManualFailoverOutcome {
        let Ok(_guard) = self.transition_lock.try_lock() else {
            return ManualFailoverOutcome {
                success: false,
                error: Some("transition already in progress".to_string()),
            };
        };

        self.apply_transition(target, triggers::MANUAL, reason);
        ManualFailoverOutcome {
            success: true,
            error: None,
        }
    }

    /// Re-probe the primary out of band and, on success, transition back to
    /// `database`. Bounded attempts with doubling backoff; a failed
    /// reconnect leaves the current mode untouched.
    pub async fn force_reconnect(&self, prober: &dyn Prober) -> ReconnectOutcome {
        let Ok(_guard) = self.transition_lock.try_lock() else {
            return ReconnectOutcome {
                success: false,
                attempts: 0,
                error: Some("transition already in progress".to_string()),
            };
        };

        let max_attempts = self.config.reconnect_max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.config.reconnect_backoff_ms);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match prober.probe().await {
                Ok(latency) => {
                    self.monitor.record_success(latency);
                    if self.mode() != StorageMode::Database {
                        self.apply_transition(
                            StorageMode::Database,
                            triggers::FORCED_RECONNECT,
                            &format!("primary reachable after {attempt} attempt(s)"),
                        );
                    }
                    return ReconnectOutcome {
                        success: true,
                        attempts: attempt,
                        error: None,
                    };
                }
                Err(cause) => {
                    warn!(attempt, cause = %cause, "Reconnect attempt failed");
                    self.monitor.record_failure(&cause);
                    last_error = Some(cause);
                    if attempt < max_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }

        ReconnectOutcome {
            success: false,
            attempts: max_attempts,
            error: last_error,
        }
    }

    /// Spawn the process-lifetime polling task: probe primary and replicas,
    /// then evaluate failover rules. Sole writer of the monitor state.
    pub fn spawn_polling(
        self: &Arc<Self>,
        primary: Arc<dyn Prober>,
        replicas: Vec<(String, Arc<dyn Prober>)>,
    ) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        let interval = Duration::from_millis(self.config.probe_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                controller.monitor.probe_primary(primary.as_ref()).await;
                for (id, prober) in &replicas {
                    controller.monitor.probe_replica(id, prober.as_ref()).await;
                }
                controller.evaluate_rules();
            }
        })
    }

    /// Perform the transition and record its audit event. Caller must hold
    /// the transition lock.
    fn apply_transition(&self, to: StorageMode, trigger: &str, reason: &str) -> FailoverEvent {
        let from = {
            let mut mode = self.mode.write();
            let from = *mode;
            *mode = to;
            from
        };

        let event = FailoverEvent {
            timestamp: Utc::now(),
            from_mode: from,
            to_mode: to,
            trigger: trigger.to_string(),
            reason: reason.to_string(),
            success: true,
        };

        info!(
            from_mode = %from,
            to_mode = %to,
            trigger = trigger,
            reason = reason,
            "Storage mode transition"
        );

        let mut history = self.history.write();
        if history.len() >= self.config.failover_history_size {
            history.pop_front();
        }
        history.push_back(event.clone());
        event
    }
}

fn trigger_matches(
    trigger: &RuleTrigger,
    stats: &ConnectionStats,
    primary_healthy: bool,
    replica_active: bool,
    current_mode: StorageMode,
) -> bool {
    match trigger {
        RuleTrigger::PrimaryUnhealthy => !primary_healthy,
        RuleTrigger::PrimaryAndReplicasUnhealthy => !primary_healthy && !replica_active,
        RuleTrigger::PrimaryRecovered => {
            primary_healthy && current_mode != StorageMode::Database
        }
        RuleTrigger::SuccessRateBelow { threshold } => stats.success_rate < *threshold,
    }
}

/// Rules seeded at startup. All editable afterwards through the rules
/// update operation; never recreated implicitly.
fn default_rules() -> Vec<FailoverRule> {
    vec![
        FailoverRule {
            id: "total-outage".to_string(),
            name: "Primary and replicas unreachable".to_string(),
            trigger: RuleTrigger::PrimaryAndReplicasUnhealthy,
            target_mode: StorageMode::MemoryOptimized,
            priority: 10,
            enabled: true,
            cooldown_ms: 30_000,
            last_triggered: None,
        },
        FailoverRule {
            id: "primary-outage".to_string(),
            name: "Primary unreachable".to_string(),
            trigger: RuleTrigger::PrimaryUnhealthy,
            target_mode: StorageMode::Replica,
            priority: 20,
            enabled: true,
            cooldown_ms: 60_000,
            last_triggered: None,
        },
        FailoverRule {
            id: "primary-recovery".to_string(),
            name: "Primary recovered".to_string(),
            trigger: RuleTrigger::PrimaryRecovered,
            target_mode: StorageMode::Database,
            priority: 30,
            enabled: true,
            cooldown_ms: 10_000,
            last_triggered: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResilienceConfig;
    use async_trait::async_trait;

    struct AlwaysHealthy;

    #[async_trait]
    impl Prober for AlwaysHealthy {
        async fn probe(&self) -> Result<Duration, String> {
            Ok(Duration::from_millis(2))
        }
    }

    struct AlwaysDown;

    #[async_trait]
    impl Prober for AlwaysDown {
        async fn probe(&self) -> Result<Duration, String> {
            Err("connection refused".to_string())
        }
    }

    fn controller() -> Arc<ModeController> {
        let config = ResilienceConfig {
            reconnect_backoff_ms: 1,
            ..ResilienceConfig::default()
        };
        let monitor = Arc::new(HealthMonitor::new(config.clone()));
        ModeController::new(monitor, config)
    }

    async fn degrade_primary(controller: &ModeController) {
        // Three failures cross the default threshold.
        for _ in 0..3 {
            controller.monitor.probe_primary(&AlwaysDown).await;
        }
    }

    #[tokio::test]
    async fn starts_in_database_mode_with_writes_allowed() {
        let controller = controller();
        assert_eq!(controller.mode(), StorageMode::Database);
        assert!(controller.writes_allowed());
        assert!(controller.is_system_healthy());
    }

    #[tokio::test]
    async fn primary_outage_fails_over_to_replica_when_one_is_active() {
        let controller = controller();
        controller
            .monitor
            .probe_replica("east", &AlwaysHealthy)
            .await;
        degrade_primary(&controller).await;

        let event = controller.evaluate_rules().expect("a rule should fire");
        assert_eq!(event.to_mode, StorageMode::Replica);
        assert_eq!(controller.mode(), StorageMode::Replica);
        assert!(!controller.writes_allowed());
    }

    #[tokio::test]
    async fn total_outage_escalates_to_memory_optimized() {
        let controller = controller();
        degrade_primary(&controller).await;

        let event = controller.evaluate_rules().expect("a rule should fire");
        assert_eq!(event.to_mode, StorageMode::MemoryOptimized);
    }

    #[tokio::test]
    async fn recovery_rule_returns_to_database() {
        let controller = controller();
        degrade_primary(&controller).await;
        controller.evaluate_rules();
        assert_ne!(controller.mode(), StorageMode::Database);

        controller.monitor.probe_primary(&AlwaysHealthy).await;
        let event = controller.evaluate_rules().expect("recovery should fire");
        assert_eq!(event.to_mode, StorageMode::Database);
    }

    #[tokio::test]
    async fn cooldown_blocks_refire_while_condition_persists() {
        let controller = controller();
        degrade_primary(&controller).await;

        assert!(controller.evaluate_rules().is_some());
        // Mode moved away; flip it back manually so the same rule would
        // match again, then verify cooldown suppresses it.
        controller.trigger_manual_failover(StorageMode::Database, "test reset");
        assert!(controller.evaluate_rules().is_none());
    }

    #[tokio::test]
    async fn manual_failover_records_event() {
        let controller = controller();
        let outcome =
            controller.trigger_manual_failover(StorageMode::ReadOnly, "maintenance window");
        assert!(outcome.success);
        assert_eq!(controller.mode(), StorageMode::ReadOnly);

        let history = controller.failover_history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].trigger, "manual");
        assert_eq!(history[0].to_mode, StorageMode::ReadOnly);
        assert!(history[0].success);
    }

    #[tokio::test]
    async fn read_only_override_wins_over_writable_mode() {
        let controller = controller();
        controller.set_read_only(true);
        assert_eq!(controller.mode(), StorageMode::Database);
        assert!(!controller.writes_allowed());
        assert!(!controller.is_system_healthy());

        controller.set_read_only(false);
        assert!(controller.writes_allowed());
    }

    #[tokio::test]
    async fn concurrent_manual_failover_fails_fast() {
        let controller = controller();
        let _guard = controller.transition_lock.lock().await;

        let outcome = controller.trigger_manual_failover(StorageMode::Replica, "contender");
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("in progress"));
        assert_eq!(controller.mode(), StorageMode::Database);
    }

    #[tokio::test]
    async fn force_reconnect_success_restores_database_mode() {
        let controller = controller();
        degrade_primary(&controller).await;
        controller.evaluate_rules();
        assert_ne!(controller.mode(), StorageMode::Database);

        let outcome = controller.force_reconnect(&AlwaysHealthy).await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(controller.mode(), StorageMode::Database);
    }

    #[tokio::test]
    async fn force_reconnect_exhausts_bounded_attempts_and_keeps_mode() {
        let controller = controller();
        degrade_primary(&controller).await;
        controller.evaluate_rules();
        let degraded_mode = controller.mode();

        let outcome = controller.force_reconnect(&AlwaysDown).await;
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 5);
        assert!(outcome.error.is_some());
        assert_eq!(controller.mode(), degraded_mode);
    }

    #[tokio::test]
    async fn history_is_bounded_and_newest_first() {
        let config = ResilienceConfig {
            failover_history_size: 3,
            ..ResilienceConfig::default()
        };
        let monitor = Arc::new(HealthMonitor::new(config.clone()));
        let controller = ModeController::new(monitor, config);

        for (i, mode) in [
            StorageMode::Replica,
            StorageMode::Hybrid,
            StorageMode::ReadOnly,
            StorageMode::Database,
        ]
        .iter()
        .enumerate()
        {
            controller.trigger_manual_failover(*mode, &format!("step {i}"));
        }

        let history = controller.failover_history(10);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].to_mode, StorageMode::Database);
        assert_eq!(history[2].to_mode, StorageMode::Hybrid);
    }

    #[tokio::test]
    async fn update_rule_changes_behavior_and_rejects_unknown_id() {
        let controller = controller();
        let updated = controller
            .update_rule(
                "primary-outage",
                RuleUpdate {
                    enabled: Some(false),
                    ..RuleUpdate::default()
                },
            )
            .unwrap();
        assert!(!updated.enabled);

        assert!(controller
            .update_rule("no-such-rule", RuleUpdate::default())
            .is_err());

        // With the replica rule disabled and replicas active, the outage
        // escalation is skipped entirely (total-outage needs no replicas).
        controller
            .monitor
            .probe_replica("east", &AlwaysHealthy)
            .await;
        degrade_primary(&controller).await;
        assert!(controller.evaluate_rules().is_none());
    }
}
