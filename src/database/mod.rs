//! # Database Layer
//!
//! Pool construction for the primary store and its replicas, plus the
//! schema migrations for the auto-fix tables.

pub mod connection;
pub mod migrations;

pub use connection::{primary_pool, replica_pool};
pub use migrations::run_migrations;
