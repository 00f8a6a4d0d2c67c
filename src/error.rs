//! # Structured Error Handling
//!
//! Crate-level error taxonomy. Web-facing errors (gate rejections, degraded
//! responses) live in [`crate::web::errors`] and map onto stable HTTP status
//! codes; this module covers the internal layers.

use thiserror::Error;

/// Errors surfaced by the resilience and auto-fix layers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
