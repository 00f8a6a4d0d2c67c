//! # Replica Tracking
//!
//! Replicas are configured statically and tracked dynamically. A replica can
//! only be considered active if its last probe was healthy within the
//! staleness window; a replica nobody has probed recently is treated as
//! unavailable regardless of its last verdict.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Per-replica health record, updated on every probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaHealth {
    pub healthy: bool,
    pub latency_ms: u64,
    pub last_checked: DateTime<Utc>,
}

impl ReplicaHealth {
    /// A replica is active only if its last probe was healthy and recent.
    pub fn is_active(&self, staleness_secs: i64) -> bool {
        self.healthy && Utc::now() - self.last_checked <= Duration::seconds(staleness_secs)
    }
}

/// Concurrent map of replica id to last observed health.
#[derive(Default)]
pub struct ReplicaTracker {
    replicas: DashMap<String, ReplicaHealth>,
}

impl ReplicaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: &str, healthy: bool, latency_ms: u64) {
        self.replicas.insert(
            id.to_string(),
            ReplicaHealth {
                healthy,
                latency_ms,
                last_checked: Utc::now(),
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<ReplicaHealth> {
        self.replicas.get(id).map(|r| r.clone())
    }

    pub fn snapshot(&self) -> Vec<(String, ReplicaHealth)> {
        let mut entries: Vec<_> = self
            .replicas
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn any_active(&self, staleness_secs: i64) -> bool {
        self.replicas
            .iter()
            .any(|entry| entry.value().is_active(staleness_secs))
    }
}
