// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres-backed [`Store`] against the literal `async_ix_jobs` schema:
//!
//! ```sql
//! CREATE TABLE async_ix_jobs (
//!     id               TEXT PRIMARY KEY,
//!     handler_name     TEXT,
//!     source           TEXT NOT NULL,
//!     status           TEXT NOT NULL,
//!     progress_current BIGINT NOT NULL DEFAULT 0,
//!     progress_total   BIGINT NOT NULL DEFAULT 0,
//!     cost_estimate    DOUBLE PRECISION NOT NULL DEFAULT 0,
//!     cost_actual      DOUBLE PRECISION NOT NULL DEFAULT 0,
//!     pulse_state      TEXT,
//!     error            TEXT,
//!     payload          BYTEA,
//!     parent_job_id    TEXT REFERENCES async_ix_jobs(id),
//!     retry_count      INTEGER NOT NULL DEFAULT 0,
//!     created_at       TIMESTAMPTZ NOT NULL,
//!     started_at       TIMESTAMPTZ,
//!     completed_at     TIMESTAMPTZ,
//!     updated_at       TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX async_ix_jobs_dequeue_idx ON async_ix_jobs (created_at DESC) WHERE status = 'queued';
//! CREATE INDEX async_ix_jobs_parent_idx ON async_ix_jobs (parent_job_id);
//! ```

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ix_core::{HandlerName, Job, JobId, JobStatus, Progress, PulseState, Source};
use sqlx::{FromRow, PgPool, Row};

use crate::error::StoreError;
use crate::store::{JobCounts, Store};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: String,
    handler_name: Option<String>,
    source: String,
    status: String,
    progress_current: i64,
    progress_total: i64,
    cost_estimate: f64,
    cost_actual: f64,
    pulse_state: Option<String>,
    error: Option<String>,
    payload: Option<Vec<u8>>,
    parent_job_id: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = JobStatus::from_str(&row.status)
            .map_err(|e| StoreError::Backend(sqlx::Error::Decode(Box::new(e))))?;
        let pulse_state = row
            .pulse_state
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| StoreError::Backend(sqlx::Error::Decode(Box::new(e))))?;

        Ok(Job {
            id: JobId::from(row.id),
            handler_name: row.handler_name.map(HandlerName::from),
            source: Source::from(row.source),
            status,
            progress: Progress::new(row.progress_current as u64, row.progress_total as u64),
            cost_estimate: row.cost_estimate,
            cost_actual: row.cost_actual,
            pulse_state,
            payload: row.payload.unwrap_or_default(),
            error: row.error,
            parent_job_id: row.parent_job_id.map(JobId::from),
            retry_count: row.retry_count as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

fn pulse_json(job: &Job) -> Result<Option<String>, StoreError> {
    job.pulse_state
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Backend(sqlx::Error::Encode(Box::new(e))))
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound(JobId::from("")),
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => StoreError::Closed,
        other => StoreError::Backend(other),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        let pulse = pulse_json(job)?;
        sqlx::query(
            r#"
            INSERT INTO async_ix_jobs (
                id, handler_name, source, status,
                progress_current, progress_total,
                cost_estimate, cost_actual,
                pulse_state, error, payload,
                parent_job_id, retry_count,
                created_at, started_at, completed_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.handler_name.as_ref().map(|h| h.as_str()))
        .bind(job.source.as_str())
        .bind(job.status.to_string())
        .bind(job.progress.current as i64)
        .bind(job.progress.total as i64)
        .bind(job.cost_estimate)
        .bind(job.cost_actual)
        .bind(pulse)
        .bind(&job.error)
        .bind(if job.payload.is_empty() { None } else { Some(&job.payload) })
        .bind(job.parent_job_id.as_ref().map(|p| p.as_str()))
        .bind(job.retry_count as i32)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Job, StoreError> {
        let row: JobRow = sqlx::query_as("SELECT * FROM async_ix_jobs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        row.try_into()
    }

    async fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        let pulse = pulse_json(job)?;
        let result = sqlx::query(
            r#"
            UPDATE async_ix_jobs SET
                handler_name = $2, source = $3, status = $4,
                progress_current = $5, progress_total = $6,
                cost_estimate = $7, cost_actual = $8,
                pulse_state = $9, error = $10, payload = $11,
                parent_job_id = $12, retry_count = $13,
                started_at = $14, completed_at = $15, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.handler_name.as_ref().map(|h| h.as_str()))
        .bind(job.source.as_str())
        .bind(job.status.to_string())
        .bind(job.progress.current as i64)
        .bind(job.progress.total as i64)
        .bind(job.cost_estimate)
        .bind(job.cost_actual)
        .bind(pulse)
        .bind(&job.error)
        .bind(if job.payload.is_empty() { None } else { Some(&job.payload) })
        .bind(job.parent_job_id.as_ref().map(|p| p.as_str()))
        .bind(job.retry_count as i32)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(job.id.clone()));
        }
        Ok(())
    }

    async fn delete_job(&self, id: &JobId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM async_ix_jobs WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>, StoreError> {
        let rows: Vec<JobRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT * FROM async_ix_jobs WHERE status = $1 ORDER BY created_at DESC LIMIT $2",
                )
                .bind(status.to_string())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as("SELECT * FROM async_ix_jobs ORDER BY created_at DESC LIMIT $1")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn list_active_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM async_ix_jobs
            WHERE status IN ('queued', 'running', 'paused')
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn list_running_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM async_ix_jobs WHERE status = 'running' ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn list_tasks_by_parent(&self, parent_id: &JobId) -> Result<Vec<Job>, StoreError> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM async_ix_jobs WHERE parent_job_id = $1 ORDER BY created_at ASC",
        )
        .bind(parent_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn cleanup_old_jobs(&self, age: Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::MAX);
        let result = sqlx::query(
            r#"
            DELETE FROM async_ix_jobs
            WHERE status IN ('completed', 'failed', 'cancelled')
              AND completed_at IS NOT NULL
              AND completed_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn find_active_job_by_source_and_handler(
        &self,
        source: &Source,
        handler: &HandlerName,
    ) -> Result<Option<Job>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM async_ix_jobs
            WHERE source = $1 AND handler_name = $2
              AND status IN ('queued', 'running', 'paused')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(source.as_str())
        .bind(handler.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        row.map(Job::try_from).transpose()
    }

    async fn find_recent_job_by_source_and_handler(
        &self,
        source: &Source,
        handler: &HandlerName,
        window: Duration,
    ) -> Result<Option<Job>, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM async_ix_jobs
            WHERE source = $1 AND handler_name = $2
              AND status IN ('completed', 'failed', 'cancelled')
              AND completed_at >= $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(source.as_str())
        .bind(handler.as_str())
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        row.map(Job::try_from).transpose()
    }

    async fn job_counts(&self) -> Result<JobCounts, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'queued') AS queued,
                COUNT(*) FILTER (WHERE status = 'running') AS running
            FROM async_ix_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(JobCounts {
            queued: row.try_get::<i64, _>("queued").unwrap_or(0) as u64,
            running: row.try_get::<i64, _>("running").unwrap_or(0) as u64,
        })
    }

    async fn dequeue(&self) -> Result<Option<Job>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE async_ix_jobs
            SET status = 'running', started_at = COALESCE(started_at, NOW()), updated_at = NOW()
            WHERE id = (
                SELECT id FROM async_ix_jobs
                WHERE status = 'queued'
                ORDER BY created_at DESC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        row.map(Job::try_from).transpose()
    }
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
