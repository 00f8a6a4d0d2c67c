//! # Suggestion Model
//!
//! A detected, unresolved data-integrity issue awaiting optional
//! auto-remediation. Suggestions are created only by detection runs and
//! transition `OPEN -> APPLIED` or `OPEN -> FAILED` exactly once; terminal
//! states are never reopened.
//!
//! ## Database Schema
//!
//! Maps to `bot_suggestions`:
//! ```sql
//! CREATE TABLE bot_suggestions (
//!   id BIGSERIAL PRIMARY KEY,
//!   run_id UUID NOT NULL,
//!   kind VARCHAR NOT NULL,
//!   severity VARCHAR NOT NULL,
//!   election_ref VARCHAR,
//!   state VARCHAR,
//!   message TEXT NOT NULL,
//!   payload JSONB,
//!   status VARCHAR NOT NULL DEFAULT 'OPEN',
//!   error TEXT,
//!   acted_at TIMESTAMPTZ,
//!   created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! The `OPEN -> terminal` transition is a single compare-and-set
//! (`UPDATE ... WHERE status = 'OPEN'`) so a second concurrent apply on the
//! same id deterministically observes the non-OPEN status and rejects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use std::fmt;
use uuid::Uuid;

/// Severity of a detected issue. Ordering matters: policies cap the maximum
/// severity a kind may auto-fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid severity: {s}")),
        }
    }
}

/// Lifecycle status. `Open` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "APPLIED")]
    Applied,
    #[serde(rename = "FAILED")]
    Failed,
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Applied => write!(f, "APPLIED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "APPLIED" => Ok(Self::Applied),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid suggestion status: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: i64,
    pub run_id: Uuid,
    pub kind: String,
    pub severity: String,
    pub election_ref: Option<String>,
    pub state: Option<String>,
    pub message: String,
    pub payload: Option<serde_json::Value>,
    pub status: String,
    pub error: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// New suggestion for creation by a detection task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSuggestion {
    pub run_id: Uuid,
    pub kind: String,
    pub severity: Severity,
    pub election_ref: Option<String>,
    pub state: Option<String>,
    pub message: String,
    pub payload: Option<serde_json::Value>,
}

impl Suggestion {
    /// Typed severity; rows hold the lowercase string form.
    pub fn severity(&self) -> Result<Severity, String> {
        self.severity.parse()
    }

    /// Typed status; rows hold the uppercase string form.
    pub fn status(&self) -> Result<SuggestionStatus, String> {
        self.status.parse()
    }

    pub fn is_open(&self) -> bool {
        self.status == "OPEN"
    }

    pub async fn create(pool: &PgPool, new: NewSuggestion) -> Result<Suggestion, sqlx::Error> {
        sqlx::query_as::<_, Suggestion>(
            r#"
            INSERT INTO bot_suggestions
                (run_id, kind, severity, election_ref, state, message, payload, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'OPEN')
            RETURNING *
            "#,
        )
        .bind(new.run_id)
        .bind(&new.kind)
        .bind(new.severity.to_string())
        .bind(&new.election_ref)
        .bind(&new.state)
        .bind(&new.message)
        .bind(&new.payload)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Suggestion>, sqlx::Error> {
        sqlx::query_as::<_, Suggestion>("SELECT * FROM bot_suggestions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Open suggestions, newest first.
    pub async fn list_open(pool: &PgPool, limit: i64) -> Result<Vec<Suggestion>, sqlx::Error> {
        sqlx::query_as::<_, Suggestion>(
            r#"
            SELECT * FROM bot_suggestions
            WHERE status = 'OPEN'
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Lock and reload one row inside the caller's transaction.
    pub async fn lock_for_apply(
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<Suggestion>, sqlx::Error> {
        sqlx::query_as::<_, Suggestion>(
            "SELECT * FROM bot_suggestions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Atomic OPEN -> APPLIED compare-and-set. Returns false when the row
    /// was not OPEN, which is how a losing concurrent apply finds out.
    pub async fn mark_applied(conn: &mut PgConnection, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bot_suggestions
            SET status = 'APPLIED', acted_at = NOW(), error = NULL
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Atomic OPEN -> FAILED compare-and-set with the error retained.
    /// Runs against the pool, not the apply transaction: the apply rolls
    /// back, the failure marker must survive.
    pub async fn mark_failed(pool: &PgPool, id: i64, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE bot_suggestions
            SET status = 'FAILED', acted_at = NOW(), error = $2
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn severity_ordering_matches_escalation() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_round_trips_through_strings() {
        for severity in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            assert_eq!(Severity::from_str(&severity.to_string()).unwrap(), severity);
        }
        assert!(Severity::from_str("catastrophic").is_err());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            SuggestionStatus::Open,
            SuggestionStatus::Applied,
            SuggestionStatus::Failed,
        ] {
            assert_eq!(
                SuggestionStatus::from_str(&status.to_string()).unwrap(),
                status
            );
        }
        assert!(SuggestionStatus::from_str("open").is_err());
    }

    #[test]
    fn typed_accessors_parse_row_strings() {
        let suggestion = Suggestion {
            id: 1,
            run_id: Uuid::new_v4(),
            kind: "CONGRESS_MISMATCH".to_string(),
            severity: "high".to_string(),
            election_ref: None,
            state: Some("TX".to_string()),
            message: "delegation count off by 2".to_string(),
            payload: None,
            status: "OPEN".to_string(),
            error: None,
            acted_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(suggestion.severity().unwrap(), Severity::High);
        assert_eq!(suggestion.status().unwrap(), SuggestionStatus::Open);
        assert!(suggestion.is_open());
    }
}
