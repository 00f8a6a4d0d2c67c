//! # Detection Run Model
//!
//! Groups the suggestions produced by one detection pass. Maps to
//! `bot_task_runs`:
//!
//! ```sql
//! CREATE TABLE bot_task_runs (
//!   run_id UUID PRIMARY KEY,
//!   trigger VARCHAR NOT NULL,
//!   tasks JSONB NOT NULL,
//!   started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   finished_at TIMESTAMPTZ
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BotTaskRun {
    pub run_id: Uuid,
    pub trigger: String,
    pub tasks: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BotTaskRun {
    /// Open a new run record before the detection tasks execute.
    pub async fn start(
        pool: &PgPool,
        trigger: &str,
        tasks: &[&str],
    ) -> Result<BotTaskRun, sqlx::Error> {
        sqlx::query_as::<_, BotTaskRun>(
            r#"
            INSERT INTO bot_task_runs (run_id, trigger, tasks)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(trigger)
        .bind(serde_json::json!(tasks))
        .fetch_one(pool)
        .await
    }

    /// Stamp the run finished once every task has completed.
    pub async fn finish(pool: &PgPool, run_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bot_task_runs SET finished_at = NOW() WHERE run_id = $1")
            .bind(run_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Recent runs, newest first.
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<BotTaskRun>, sqlx::Error> {
        sqlx::query_as::<_, BotTaskRun>(
            "SELECT * FROM bot_task_runs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
