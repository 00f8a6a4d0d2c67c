//! # Resilience Module
//!
//! Storage health monitoring and failover orchestration. Keeps the service
//! answering reads while the primary store degrades and guarantees no write
//! executes while the system is unhealthy.
//!
//! ## Architecture
//!
//! - **HealthMonitor**: periodic probes against primary and replicas,
//!   rolling failure counts, a bounded diagnostics ring buffer
//! - **ModeController**: the authoritative storage mode state machine,
//!   rule-driven automatic failover, manual triggers, forced reconnect,
//!   and the append-only failover event history
//! - **ReplicaTracker**: per-replica health with a staleness window
//! - **DegradedCache**: bounded in-memory fallback for memory modes
//!
//! The write guard in [`crate::web::middleware`] and the apply pipeline's
//! final safety gate in [`crate::autofix`] both read the controller's live
//! signal; neither keeps its own cached copy.

pub mod controller;
pub mod health_monitor;
pub mod memory_cache;
pub mod modes;
pub mod replica;

pub use controller::{
    FailoverEvent, FailoverRule, HealthStatus, ManualFailoverOutcome, ModeController,
    ReconnectOutcome, RuleTrigger, RuleUpdate,
};
pub use health_monitor::{
    ConnectionStats, HealthMonitor, MonitorSnapshot, PoolProber, ProbeRecord, Prober,
};
pub use memory_cache::DegradedCache;
pub use modes::StorageMode;
pub use replica::{ReplicaHealth, ReplicaTracker};
