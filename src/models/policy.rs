//! # Auto-Fix Policy Model
//!
//! Per-suggestion-kind configuration governing whether, and up to what
//! severity, a kind may be auto-remediated. Mutated only through the
//! explicit admin update operation; the gate chain reads it fresh on every
//! apply. Maps to `autofix_policies`:
//!
//! ```sql
//! CREATE TABLE autofix_policies (
//!   kind VARCHAR PRIMARY KEY,
//!   auto_fix_enabled BOOLEAN NOT NULL DEFAULT FALSE,
//!   auto_fix_max_severity VARCHAR NOT NULL DEFAULT 'low',
//!   has_fix_sql BOOLEAN NOT NULL DEFAULT FALSE,
//!   has_verification BOOLEAN NOT NULL DEFAULT FALSE,
//!   applied_count BIGINT NOT NULL DEFAULT 0,
//!   updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use crate::models::suggestion::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub kind: String,
    pub auto_fix_enabled: bool,
    pub auto_fix_max_severity: String,
    pub has_fix_sql: bool,
    pub has_verification: bool,
    pub applied_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Admin update applied to one policy. Absent fields keep current values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUpdate {
    pub auto_fix_enabled: Option<bool>,
    pub auto_fix_max_severity: Option<Severity>,
}

impl Policy {
    /// Typed maximum severity; rows hold the lowercase string form.
    pub fn max_severity(&self) -> Result<Severity, String> {
        self.auto_fix_max_severity.parse()
    }

    /// True when this policy permits auto-fixing a suggestion of the given
    /// severity.
    pub fn allows(&self, severity: Severity) -> bool {
        self.auto_fix_enabled
            && self
                .max_severity()
                .map(|max| severity <= max)
                .unwrap_or(false)
    }

    pub async fn find_by_kind(pool: &PgPool, kind: &str) -> Result<Option<Policy>, sqlx::Error> {
        sqlx::query_as::<_, Policy>("SELECT * FROM autofix_policies WHERE kind = $1")
            .bind(kind)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Policy>, sqlx::Error> {
        sqlx::query_as::<_, Policy>("SELECT * FROM autofix_policies ORDER BY kind")
            .fetch_all(pool)
            .await
    }

    /// Explicit admin update. Policies for unknown kinds are not created
    /// implicitly; the caller decides which kinds exist via seeding.
    pub async fn update(
        pool: &PgPool,
        kind: &str,
        update: PolicyUpdate,
    ) -> Result<Option<Policy>, sqlx::Error> {
        sqlx::query_as::<_, Policy>(
            r#"
            UPDATE autofix_policies
            SET auto_fix_enabled = COALESCE($2, auto_fix_enabled),
                auto_fix_max_severity = COALESCE($3, auto_fix_max_severity),
                updated_at = NOW()
            WHERE kind = $1
            RETURNING *
            "#,
        )
        .bind(kind)
        .bind(update.auto_fix_enabled)
        .bind(update.auto_fix_max_severity.map(|s| s.to_string()))
        .fetch_optional(pool)
        .await
    }

    /// Bump the applied counter inside the apply transaction.
    pub async fn increment_applied(
        conn: &mut PgConnection,
        kind: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE autofix_policies
            SET applied_count = applied_count + 1, updated_at = NOW()
            WHERE kind = $1
            "#,
        )
        .bind(kind)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(enabled: bool, max: &str) -> Policy {
        Policy {
            kind: "CONGRESS_MISMATCH".to_string(),
            auto_fix_enabled: enabled,
            auto_fix_max_severity: max.to_string(),
            has_fix_sql: true,
            has_verification: true,
            applied_count: 0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn allows_up_to_and_including_max_severity() {
        let p = policy(true, "high");
        assert!(p.allows(Severity::Low));
        assert!(p.allows(Severity::High));
        assert!(!p.allows(Severity::Critical));
    }

    #[test]
    fn disabled_policy_allows_nothing() {
        let p = policy(false, "critical");
        assert!(!p.allows(Severity::Low));
    }

    #[test]
    fn malformed_row_severity_allows_nothing() {
        let p = policy(true, "unbounded");
        assert!(!p.allows(Severity::Low));
    }
}
