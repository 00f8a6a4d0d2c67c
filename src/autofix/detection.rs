//! # Suggestion Engine (Detection)
//!
//! Runs a named set of detection tasks per invocation, each independent and
//! side-effect-free except for suggestion creation. Detection never mutates
//! domain data; a task that errors is recorded and skipped without aborting
//! the run.
//!
//! Tasks:
//! - `congress_mismatch`: delegation seat counts vs. the known-good
//!   baseline, severity scaled by the magnitude of the deviation
//! - `low_candidate_count`: upcoming races below the minimum expected
//!   candidate cardinality, always critical
//! - `election_date_drift`: stored election dates vs. the
//!   lowest-priority-numbered authority source
//! - `month_pattern`: a local election type expected only in a specific
//!   month falling outside that month

use crate::config::AutofixConfig;
use crate::error::CoreError;
use crate::models::suggestion::{NewSuggestion, Severity, Suggestion};
use crate::models::task_run::BotTaskRun;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

const TASK_NAMES: &[&str] = &[
    "congress_mismatch",
    "low_candidate_count",
    "election_date_drift",
    "month_pattern",
];

/// Summary of one detection pass.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub run_id: Uuid,
    pub created: usize,
    pub tasks: Vec<TaskReport>,
}

#[derive(Debug, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub suggestions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs detection tasks and materializes suggestions under a run.
pub struct SuggestionEngine {
    pool: PgPool,
    config: AutofixConfig,
}

impl SuggestionEngine {
    pub fn new(pool: PgPool, config: AutofixConfig) -> Self {
        Self { pool, config }
    }

    /// Execute every detection task, grouping created suggestions under one
    /// run record. Individual task errors are retained in the report, never
    /// propagated.
    pub async fn run_detection(&self, trigger: &str) -> Result<DetectionReport, CoreError> {
        let run = BotTaskRun::start(&self.pool, trigger, TASK_NAMES).await?;
        let mut report = DetectionReport {
            run_id: run.run_id,
            created: 0,
            tasks: Vec::with_capacity(TASK_NAMES.len()),
        };

        for task in TASK_NAMES {
            let found = match *task {
                "congress_mismatch" => self.detect_congress_mismatch(run.run_id).await,
                "low_candidate_count" => self.detect_low_candidate_count(run.run_id).await,
                "election_date_drift" => self.detect_election_date_drift(run.run_id).await,
                "month_pattern" => self.detect_month_pattern(run.run_id).await,
                _ => unreachable!("unknown task name"),
            };

            match found {
                Ok(suggestions) => {
                    let mut created = 0;
                    for new in suggestions {
                        Suggestion::create(&self.pool, new).await?;
                        created += 1;
                    }
                    report.created += created;
                    report.tasks.push(TaskReport {
                        task: (*task).to_string(),
                        suggestions: created,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(task = task, error = %e, "Detection task failed");
                    report.tasks.push(TaskReport {
                        task: (*task).to_string(),
                        suggestions: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        BotTaskRun::finish(&self.pool, run.run_id).await?;
        info!(
            run_id = %run.run_id,
            created = report.created,
            trigger = trigger,
            "Detection run complete"
        );
        Ok(report)
    }

    /// Cross-reference actual delegation seat counts against the baseline.
    async fn detect_congress_mismatch(
        &self,
        run_id: Uuid,
    ) -> Result<Vec<NewSuggestion>, sqlx::Error> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT d.state, d.seat_count, b.expected_count
            FROM congress_delegations d
            JOIN congress_baseline b ON b.state = d.state
            WHERE d.seat_count <> b.expected_count
            ORDER BY d.state
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(state, actual, expected)| {
                let deviation = (actual - expected).unsigned_abs();
                NewSuggestion {
                    run_id,
                    kind: crate::constants::kinds::CONGRESS_MISMATCH.to_string(),
                    severity: congress_severity(deviation),
                    election_ref: None,
                    state: Some(state.clone()),
                    message: format!(
                        "{state} delegation has {actual} seats, baseline expects {expected}"
                    ),
                    payload: Some(serde_json::json!({
                        "state": state,
                        "actual_count": actual,
                        "expected_count": expected,
                    })),
                }
            })
            .collect())
    }

    /// Upcoming races with fewer candidates than the configured minimum.
    async fn detect_low_candidate_count(
        &self,
        run_id: Uuid,
    ) -> Result<Vec<NewSuggestion>, sqlx::Error> {
        let rows: Vec<(String, Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT e.ref, e.state, COUNT(c.id) AS candidate_count
            FROM elections e
            LEFT JOIN candidates c ON c.election_ref = e.ref
            WHERE e.election_date >= CURRENT_DATE
            GROUP BY e.ref, e.state
            HAVING COUNT(c.id) < $1
            ORDER BY e.ref
            "#,
        )
        .bind(self.config.min_candidates_per_race)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(election_ref, state, count)| NewSuggestion {
                run_id,
                kind: crate::constants::kinds::LOW_CANDIDATE_COUNT.to_string(),
                severity: Severity::Critical,
                message: format!(
                    "race {election_ref} has {count} candidate(s), expected at least {}",
                    self.config.min_candidates_per_race
                ),
                payload: Some(serde_json::json!({
                    "candidate_count": count,
                    "minimum": self.config.min_candidates_per_race,
                })),
                election_ref: Some(election_ref),
                state,
            })
            .collect())
    }

    /// Compare stored election dates against the most authoritative source
    /// (lowest priority number wins when authorities disagree).
    async fn detect_election_date_drift(
        &self,
        run_id: Uuid,
    ) -> Result<Vec<NewSuggestion>, sqlx::Error> {
        let rows: Vec<(String, Option<String>, NaiveDate, NaiveDate, String)> = sqlx::query_as(
            r#"
            SELECT e.ref, e.state, e.election_date, a.election_date, a.source
            FROM elections e
            JOIN LATERAL (
                SELECT election_date, source
                FROM authority_election_dates
                WHERE election_ref = e.ref
                ORDER BY priority ASC
                LIMIT 1
            ) a ON TRUE
            WHERE e.election_date <> a.election_date
            ORDER BY e.ref
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(election_ref, state, stored, authoritative, source)| NewSuggestion {
                    run_id,
                    kind: crate::constants::kinds::ELECTION_DATE_DRIFT.to_string(),
                    severity: Severity::High,
                    message: format!(
                        "election {election_ref} stored date {stored} drifts from {source} date {authoritative}"
                    ),
                    payload: Some(serde_json::json!({
                        "stored_date": stored.to_string(),
                        "authoritative_date": authoritative.to_string(),
                        "source": source,
                    })),
                    election_ref: Some(election_ref),
                    state,
                },
            )
            .collect())
    }

    /// Heuristic: the configured local election type is expected only in
    /// its configured month.
    async fn detect_month_pattern(&self, run_id: Uuid) -> Result<Vec<NewSuggestion>, sqlx::Error> {
        let rows: Vec<(String, Option<String>, NaiveDate)> = sqlx::query_as(
            r#"
            SELECT ref, state, election_date
            FROM elections
            WHERE election_type = $1
              AND EXTRACT(MONTH FROM election_date) <> $2
            ORDER BY ref
            "#,
        )
        .bind(&self.config.local_election_type)
        .bind(self.config.expected_local_election_month as i32)
        .fetch_all(&self.pool)
        .await?;

        let expected_month = self.config.expected_local_election_month;
        Ok(rows
            .into_iter()
            .map(|(election_ref, state, date)| NewSuggestion {
                run_id,
                kind: crate::constants::kinds::MONTH_PATTERN.to_string(),
                severity: Severity::Medium,
                message: format!(
                    "{} election {election_ref} falls in month {}, expected month {expected_month}",
                    self.config.local_election_type,
                    date.month(),
                ),
                payload: Some(serde_json::json!({
                    "election_date": date.to_string(),
                    "expected_month": expected_month,
                })),
                election_ref: Some(election_ref),
                state,
            })
            .collect())
    }
}

/// Severity scaled by how far the delegation count deviates from baseline.
fn congress_severity(deviation: u64) -> Severity {
    match deviation {
        0 | 1 => Severity::Low,
        2..=3 => Severity::Medium,
        4..=5 => Severity::High,
        _ => Severity::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn congress_severity_scales_with_deviation() {
        assert_eq!(congress_severity(1), Severity::Low);
        assert_eq!(congress_severity(2), Severity::Medium);
        assert_eq!(congress_severity(3), Severity::Medium);
        assert_eq!(congress_severity(5), Severity::High);
        assert_eq!(congress_severity(6), Severity::Critical);
        assert_eq!(congress_severity(40), Severity::Critical);
    }

    #[test]
    fn task_names_are_unique() {
        let mut names = TASK_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TASK_NAMES.len());
    }
}
