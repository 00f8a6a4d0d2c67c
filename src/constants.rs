//! # System Constants
//!
//! Operational boundaries of the resilience core: probe cadence, buffer
//! bounds, reconnect behavior and the suggestion kind registry.

/// Failover trigger sources recorded on [`crate::resilience::FailoverEvent`]s
pub mod triggers {
    pub const AUTOMATIC_RULE: &str = "automatic_rule";
    pub const MANUAL: &str = "manual";
    pub const FORCED_RECONNECT: &str = "forced_reconnect";
}

/// Suggestion kinds the detection engine produces. Only kinds with a fix
/// procedure registered in the remediator are auto-fixable.
pub mod kinds {
    pub const CONGRESS_MISMATCH: &str = "CONGRESS_MISMATCH";
    pub const LOW_CANDIDATE_COUNT: &str = "LOW_CANDIDATE_COUNT";
    pub const ELECTION_DATE_DRIFT: &str = "ELECTION_DATE_DRIFT";
    pub const MONTH_PATTERN: &str = "MONTH_PATTERN";
}

/// Default interval between health probe ticks.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 5_000;

/// Per-probe round-trip timeout. A probe that exceeds this counts as failed.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Consecutive primary failures before `is_primary_healthy` flips false.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Sliding window length for the probe success rate.
pub const SUCCESS_RATE_WINDOW: usize = 50;

/// Bounded diagnostics ring buffer length; oldest entries drop on overflow.
pub const DIAGNOSTICS_BUFFER_SIZE: usize = 100;

/// Bounded failover event history length.
pub const FAILOVER_HISTORY_SIZE: usize = 200;

/// A replica probe older than this cannot mark the replica active.
pub const DEFAULT_REPLICA_STALENESS_SECS: i64 = 30;

/// Bounded attempts for a forced primary reconnect.
pub const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Initial backoff between reconnect attempts; doubles per attempt.
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 250;

/// Bounded capacity of the degraded in-memory read cache.
pub const DEGRADED_CACHE_CAPACITY: usize = 512;
