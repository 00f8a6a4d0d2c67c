//! # Data Models
//!
//! SQLx-backed records for the auto-remediation pipeline: suggestions,
//! detection runs, and per-kind policies. The failover side's records
//! (events, rules) are in-memory by design and live in
//! [`crate::resilience`].

pub mod policy;
pub mod suggestion;
pub mod task_run;

pub use policy::{Policy, PolicyUpdate};
pub use suggestion::{NewSuggestion, Severity, Suggestion, SuggestionStatus};
pub use task_run::BotTaskRun;
