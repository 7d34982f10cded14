// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bidirectional mapping between [`Job`] values and the persistent row.
//!
//! `Store` owns the schema contract for the `async_ix_jobs` table. It
//! knows nothing about status-transition semantics beyond what is needed
//! to implement an atomic dequeue — that policy lives one layer up, in
//! `ix-queue`.

use std::time::Duration;

use async_trait::async_trait;
use ix_core::{HandlerName, Job, JobId, JobStatus, Source};

use crate::error::StoreError;

/// Queued/running totals returned by [`Store::job_counts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub queued: u64,
    pub running: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a brand-new row. The caller supplies `job.id`; it is the
    /// caller's responsibility to ensure uniqueness.
    async fn create_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Fetch a job by id. `StoreError::NotFound` if it does not exist.
    async fn get_job(&self, id: &JobId) -> Result<Job, StoreError>;

    /// Overwrite an existing row with `job`'s fields, bumping `updated_at`.
    async fn update_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Delete a single row by id. `StoreError::NotFound` if it does not exist.
    async fn delete_job(&self, id: &JobId) -> Result<(), StoreError>;

    /// List jobs, optionally filtered by status, newest-first, capped at `limit`.
    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// List jobs with status ∈ {queued, running, paused}, newest-first.
    async fn list_active_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// List every row still marked running. Used by orphan recovery on
    /// startup; callers are responsible for applying `limit` themselves
    /// (the cap is a pool-level constant, not a store concern).
    async fn list_running_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// List the children of `parent_id`, ordered by creation ascending.
    async fn list_tasks_by_parent(&self, parent_id: &JobId) -> Result<Vec<Job>, StoreError>;

    /// Delete terminal rows whose `completed_at` is older than `age`.
    async fn cleanup_old_jobs(&self, age: Duration) -> Result<u64, StoreError>;

    /// Newest job with the given (source, handler) whose status is active
    /// (queued, running, or paused), or `None`.
    async fn find_active_job_by_source_and_handler(
        &self,
        source: &Source,
        handler: &HandlerName,
    ) -> Result<Option<Job>, StoreError>;

    /// Newest terminal job with the given (source, handler) whose
    /// `completed_at` falls within `window` of now, or `None`.
    async fn find_recent_job_by_source_and_handler(
        &self,
        source: &Source,
        handler: &HandlerName,
        window: Duration,
    ) -> Result<Option<Job>, StoreError>;

    /// Queued/running totals across all jobs.
    async fn job_counts(&self) -> Result<JobCounts, StoreError>;

    /// Atomically claim the newest queued row: transition it to `running`
    /// and return it, or `None` if no queued row exists. Guarantees no two
    /// concurrent callers observe the same row.
    async fn dequeue(&self) -> Result<Option<Job>, StoreError>;
}
