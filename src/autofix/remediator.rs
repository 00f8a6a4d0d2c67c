//! # Remediator
//!
//! Applies a suggestion's kind-specific fix inside a single transaction,
//! immediately verifies the result, and commits only when verification
//! passes. Any failure rolls the transaction back and marks the suggestion
//! `FAILED` with the error retained.
//!
//! At-most-one successful apply per suggestion id: the row is locked
//! `FOR UPDATE`, re-checked `OPEN`, and the terminal transition is a
//! compare-and-set. A concurrent second apply observes the non-OPEN status
//! and rejects deterministically.

use crate::constants::kinds;
use crate::models::policy::Policy;
use crate::models::suggestion::Suggestion;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{error, info, warn};

/// Apply-path failures. Gate rejections are handled before the remediator
/// runs and live in [`crate::autofix::gates`].
#[derive(Debug, Error)]
pub enum AutofixError {
    #[error("suggestion {0} not found")]
    NotFound(i64),

    #[error("suggestion {id} is not open (status: {status})")]
    NotOpen { id: i64, status: String },

    #[error("no fix procedure for kind {0}")]
    NotAutofixable(String),

    #[error("fix for kind {kind} requires payload field {field}")]
    NoSeed { kind: String, field: &'static str },

    /// Database failures are reported outward as a generic apply failure;
    /// the detail stays in logs and on the suggestion row.
    #[error("apply failed")]
    ApplyFailed,
}

impl AutofixError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NotOpen { .. } => "not_open",
            Self::NotAutofixable(_) => "not_autofixable",
            Self::NoSeed { .. } => "no_seed",
            Self::ApplyFailed => "apply_failed",
        }
    }
}

/// Successful apply result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedOutcome {
    pub id: i64,
    pub kind: String,
    pub approved_by: String,
}

/// Per-suggestion results of a batch apply.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub applied: Vec<i64>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub id: i64,
    pub error: String,
}

/// Executes kind-specific fixes with verification.
pub struct Remediator {
    pool: PgPool,
}

impl Remediator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Human-readable description of the fix a suggestion would receive,
    /// for the preview endpoint. Read-only.
    pub fn preview(&self, suggestion: &Suggestion) -> Result<String, AutofixError> {
        match suggestion.kind.as_str() {
            kinds::CONGRESS_MISMATCH => {
                let (state, expected) = congress_seed(suggestion)?;
                Ok(format!(
                    "set congressional delegation seat count for {state} to {expected}"
                ))
            }
            kinds::ELECTION_DATE_DRIFT => {
                let (election_ref, date) = date_drift_seed(suggestion)?;
                Ok(format!("set election date for {election_ref} to {date}"))
            }
            other => Err(AutofixError::NotAutofixable(other.to_string())),
        }
    }

    /// Apply one suggestion. The caller has already cleared the gate chain;
    /// `approved_by` is the attested identity recorded on success.
    pub async fn apply(
        &self,
        id: i64,
        approved_by: &str,
    ) -> Result<AppliedOutcome, AutofixError> {
        let suggestion = Suggestion::find_by_id(&self.pool, id)
            .await
            .map_err(|e| self.db_failure(id, "load", e))?
            .ok_or(AutofixError::NotFound(id))?;

        if !suggestion.is_open() {
            return Err(AutofixError::NotOpen {
                id,
                status: suggestion.status,
            });
        }

        // Fail on missing procedure or seed before opening a transaction.
        self.preview(&suggestion)?;

        let result = self.apply_in_transaction(&suggestion).await;
        match result {
            Ok(applied) => {
                if !applied {
                    // Lost the race: another apply acted first.
                    let status = Suggestion::find_by_id(&self.pool, id)
                        .await
                        .ok()
                        .flatten()
                        .map(|s| s.status)
                        .unwrap_or_else(|| "unknown".to_string());
                    return Err(AutofixError::NotOpen { id, status });
                }
                info!(
                    suggestion_id = id,
                    kind = %suggestion.kind,
                    approved_by = approved_by,
                    "Suggestion applied"
                );
                Ok(AppliedOutcome {
                    id,
                    kind: suggestion.kind,
                    approved_by: approved_by.to_string(),
                })
            }
            Err(cause) => {
                error!(suggestion_id = id, cause = %cause, "Apply failed, rolling back");
                if let Err(e) = Suggestion::mark_failed(&self.pool, id, &cause).await {
                    warn!(suggestion_id = id, error = %e, "Could not mark suggestion failed");
                }
                Err(AutofixError::ApplyFailed)
            }
        }
    }

    /// Batch apply. Each id is processed independently; one failure never
    /// aborts the rest.
    pub async fn apply_batch(&self, ids: &[i64], approved_by: &str) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            applied: Vec::new(),
            failed: Vec::new(),
        };
        for &id in ids {
            match self.apply(id, approved_by).await {
                Ok(applied) => outcome.applied.push(applied.id),
                Err(e) => outcome.failed.push(BatchFailure {
                    id,
                    error: e.kind().to_string(),
                }),
            }
        }
        outcome
    }

    /// Fix + verification + status flip, all inside one transaction.
    /// Returns `Ok(false)` when the compare-and-set lost to a concurrent
    /// apply. An `Err` message is retained on the FAILED row.
    async fn apply_in_transaction(&self, suggestion: &Suggestion) -> Result<bool, String> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| format!("begin failed: {e}"))?;

        let locked = Suggestion::lock_for_apply(&mut tx, suggestion.id)
            .await
            .map_err(|e| format!("lock failed: {e}"))?;
        let Some(locked) = locked else {
            return Err("row disappeared during apply".to_string());
        };
        if !locked.is_open() {
            // Raced: rollback and let the caller report not_open.
            return Ok(false);
        }

        self.execute_fix(&mut tx, &locked)
            .await
            .map_err(|e| format!("fix failed: {e}"))?;
        self.verify_fix(&mut tx, &locked)
            .await
            .map_err(|e| format!("verification failed: {e}"))?;

        let flipped = Suggestion::mark_applied(&mut tx, suggestion.id)
            .await
            .map_err(|e| format!("status update failed: {e}"))?;
        if !flipped {
            return Ok(false);
        }
        Policy::increment_applied(&mut tx, &locked.kind)
            .await
            .map_err(|e| format!("policy counter update failed: {e}"))?;

        tx.commit().await.map_err(|e| format!("commit failed: {e}"))?;
        Ok(true)
    }

    async fn execute_fix(
        &self,
        conn: &mut PgConnection,
        suggestion: &Suggestion,
    ) -> Result<(), sqlx::Error> {
        match suggestion.kind.as_str() {
            kinds::CONGRESS_MISMATCH => {
                let (state, expected) =
                    congress_seed(suggestion).map_err(|_| sqlx::Error::RowNotFound)?;
                sqlx::query("UPDATE congress_delegations SET seat_count = $2 WHERE state = $1")
                    .bind(state)
                    .bind(expected)
                    .execute(conn)
                    .await?;
            }
            kinds::ELECTION_DATE_DRIFT => {
                let (election_ref, date) =
                    date_drift_seed(suggestion).map_err(|_| sqlx::Error::RowNotFound)?;
                sqlx::query("UPDATE elections SET election_date = $2 WHERE ref = $1")
                    .bind(election_ref)
                    .bind(date)
                    .execute(conn)
                    .await?;
            }
            _ => return Err(sqlx::Error::RowNotFound),
        }
        Ok(())
    }

    /// Re-query the fixed rows and require the expected values. Runs inside
    /// the same transaction as the fix, before commit.
    async fn verify_fix(
        &self,
        conn: &mut PgConnection,
        suggestion: &Suggestion,
    ) -> Result<(), String> {
        match suggestion.kind.as_str() {
            kinds::CONGRESS_MISMATCH => {
                let (state, expected) = congress_seed(suggestion).map_err(|e| e.to_string())?;
                let (actual,): (i64,) = sqlx::query_as(
                    "SELECT seat_count FROM congress_delegations WHERE state = $1",
                )
                .bind(&state)
                .fetch_one(conn)
                .await
                .map_err(|e| e.to_string())?;
                if actual != expected {
                    return Err(format!(
                        "seat count for {state} is {actual}, expected {expected}"
                    ));
                }
            }
            kinds::ELECTION_DATE_DRIFT => {
                let (election_ref, date) =
                    date_drift_seed(suggestion).map_err(|e| e.to_string())?;
                let (actual,): (NaiveDate,) =
                    sqlx::query_as("SELECT election_date FROM elections WHERE ref = $1")
                        .bind(&election_ref)
                        .fetch_one(conn)
                        .await
                        .map_err(|e| e.to_string())?;
                if actual != date {
                    return Err(format!(
                        "election date for {election_ref} is {actual}, expected {date}"
                    ));
                }
            }
            other => return Err(format!("no verification for kind {other}")),
        }
        Ok(())
    }

    fn db_failure(&self, id: i64, stage: &str, e: sqlx::Error) -> AutofixError {
        error!(suggestion_id = id, stage = stage, error = %e, "Database error during apply");
        AutofixError::ApplyFailed
    }
}

/// Seed for the congressional delegation fix: target state and expected
/// seat count.
fn congress_seed(suggestion: &Suggestion) -> Result<(String, i64), AutofixError> {
    let payload = suggestion.payload.as_ref().ok_or(AutofixError::NoSeed {
        kind: suggestion.kind.clone(),
        field: "payload",
    })?;
    let state = suggestion
        .state
        .clone()
        .or_else(|| payload.get("state").and_then(|v| v.as_str()).map(String::from))
        .ok_or(AutofixError::NoSeed {
            kind: suggestion.kind.clone(),
            field: "state",
        })?;
    let expected = payload
        .get("expected_count")
        .and_then(|v| v.as_i64())
        .ok_or(AutofixError::NoSeed {
            kind: suggestion.kind.clone(),
            field: "expected_count",
        })?;
    Ok((state, expected))
}

/// Seed for the election date fix: election ref and the authoritative date.
fn date_drift_seed(suggestion: &Suggestion) -> Result<(String, NaiveDate), AutofixError> {
    let payload = suggestion.payload.as_ref().ok_or(AutofixError::NoSeed {
        kind: suggestion.kind.clone(),
        field: "payload",
    })?;
    let election_ref = suggestion
        .election_ref
        .clone()
        .ok_or(AutofixError::NoSeed {
            kind: suggestion.kind.clone(),
            field: "election_ref",
        })?;
    let date = payload
        .get("authoritative_date")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<NaiveDate>().ok())
        .ok_or(AutofixError::NoSeed {
            kind: suggestion.kind.clone(),
            field: "authoritative_date",
        })?;
    Ok((election_ref, date))
}
