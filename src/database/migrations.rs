//! # Schema Migrations
//!
//! Idempotent schema setup for the auto-fix tables, applied at startup.
//! Each statement is `IF NOT EXISTS`-guarded so repeated runs are safe, and
//! a Postgres advisory lock prevents concurrent processes from racing the
//! setup.

use sqlx::PgPool;
use tracing::info;

const MIGRATION_LOCK_KEY: i64 = 0x42_41_4C_4C_4F_54; // "BALLOT"

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS bot_task_runs (
        run_id UUID PRIMARY KEY,
        trigger VARCHAR NOT NULL,
        tasks JSONB NOT NULL,
        started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        finished_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bot_suggestions (
        id BIGSERIAL PRIMARY KEY,
        run_id UUID NOT NULL REFERENCES bot_task_runs(run_id),
        kind VARCHAR NOT NULL,
        severity VARCHAR NOT NULL,
        election_ref VARCHAR,
        state VARCHAR,
        message TEXT NOT NULL,
        payload JSONB,
        status VARCHAR NOT NULL DEFAULT 'OPEN',
        error TEXT,
        acted_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_bot_suggestions_status
        ON bot_suggestions (status, created_at DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS autofix_policies (
        kind VARCHAR PRIMARY KEY,
        auto_fix_enabled BOOLEAN NOT NULL DEFAULT FALSE,
        auto_fix_max_severity VARCHAR NOT NULL DEFAULT 'low',
        has_fix_sql BOOLEAN NOT NULL DEFAULT FALSE,
        has_verification BOOLEAN NOT NULL DEFAULT FALSE,
        applied_count BIGINT NOT NULL DEFAULT 0,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // Policies exist per kind from day one, disabled until an admin turns
    // them on. Never recreated once present.
    r#"
    INSERT INTO autofix_policies (kind, auto_fix_enabled, auto_fix_max_severity, has_fix_sql, has_verification)
    VALUES
        ('CONGRESS_MISMATCH', FALSE, 'high', TRUE, TRUE),
        ('ELECTION_DATE_DRIFT', FALSE, 'high', TRUE, TRUE),
        ('LOW_CANDIDATE_COUNT', FALSE, 'critical', FALSE, FALSE),
        ('MONTH_PATTERN', FALSE, 'medium', FALSE, FALSE)
    ON CONFLICT (kind) DO NOTHING
    "#,
];

/// Apply the schema under an advisory lock.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    let result = async {
        for statement in STATEMENTS {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        Ok::<(), sqlx::Error>(())
    }
    .await;

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    result?;
    info!(statements = STATEMENTS.len(), "Schema migrations applied");
    Ok(())
}
