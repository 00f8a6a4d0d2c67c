#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Ballotline Core
//!
//! Resilience and auto-remediation core for the Ballotline elections
//! data-aggregation dashboard.
//!
//! ## Overview
//!
//! The wider application is routine CRUD over elections, candidates, polling
//! and campaign-finance data. This crate is the one subsystem with real
//! systems depth: a storage health/failover controller that keeps reads
//! answering while the primary store degrades, coupled with a policy-gated
//! auto-fix pipeline that safely mutates data to correct detected integrity
//! problems. The two halves meet in the apply pipeline's final safety gate,
//! which consults the failover controller's live health signal.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Health probing, replica tracking, the storage mode
//!   state machine and failover orchestration
//! - [`autofix`] - Suggestion detection, the ordered approval gate chain,
//!   and the transactional remediator
//! - [`models`] - Suggestion, task-run and policy records backed by SQLx
//! - [`web`] - Axum HTTP surface, auth, and the global write guard
//! - [`database`] - Pool construction and schema migrations
//! - [`config`] - TOML configuration with environment overrides
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ballotline_core::config::CoreConfig;
//! use ballotline_core::resilience::{HealthMonitor, ModeController};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CoreConfig::default();
//! let monitor = Arc::new(HealthMonitor::new(config.resilience.clone()));
//! let controller = ModeController::new(monitor, config.resilience.clone());
//! let status = controller.health_status();
//! println!("storage mode: {}", status.mode);
//! # Ok(())
//! # }
//! ```

pub mod autofix;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod resilience;
pub mod web;

pub use error::{CoreError, Result};
