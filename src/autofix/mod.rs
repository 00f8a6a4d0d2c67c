//! # Auto-Fix Pipeline
//!
//! Detection of data-integrity problems, the ordered approval gate chain in
//! front of mutation, and the transactional remediator.
//!
//! ## Architecture
//!
//! - **SuggestionEngine**: runs named, independent, read-only detection
//!   tasks against the store and materializes suggestions grouped under a
//!   run
//! - **ApprovalGateChain**: authentication, authorization, policy,
//!   approval, and live-health gates, in that order, each short-circuiting
//!   with its own stable rejection
//! - **Remediator**: kind-specific fix plus immediate verification inside a
//!   single transaction; commit only when verification passes, with an
//!   atomic `OPEN -> APPLIED/FAILED` compare-and-set
//!
//! The final health gate consults the live
//! [`crate::resilience::ModeController`] signal on every evaluation; it is
//! never cached.

pub mod detection;
pub mod gates;
pub mod remediator;

pub use detection::{DetectionReport, SuggestionEngine};
pub use gates::{ApplyRequest, ApprovalGateChain, GateRejection};
pub use remediator::{AppliedOutcome, AutofixError, BatchOutcome, Remediator};
