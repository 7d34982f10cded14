// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin layer above [`Store`] enforcing state-transition semantics.
//!
//! Queue never mutates in-memory job state when a store write fails —
//! every method either round-trips through the store or returns an error.

use std::sync::Arc;

use chrono::Utc;
use ix_core::{Job, JobId};
use ix_storage::Store;
use tracing::{debug, warn};

use crate::error::QueueError;

pub struct Queue {
    store: Arc<dyn Store>,
}

impl Queue {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Persist a brand-new queued row. Caller-supplied id; caller
    /// responsible for uniqueness.
    pub async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        self.store.create_job(job).await?;
        debug!(job_id = %job.id, "enqueued job");
        Ok(())
    }

    /// Atomically claim the newest queued row, transitioning it to
    /// running. Returns `None` if the queue is empty.
    pub async fn dequeue(&self) -> Result<Option<Job>, QueueError> {
        Ok(self.store.dequeue().await?)
    }

    /// Set status=paused and record `reason`. Operates regardless of
    /// current status unless the job is already terminal.
    pub async fn pause_job(&self, id: &JobId, reason: impl Into<String>) -> Result<(), QueueError> {
        let mut job = self.store.get_job(id).await?;
        if job.status.is_terminal() {
            warn!(job_id = %id, status = %job.status, "ignoring pause on terminal job");
            return Ok(());
        }
        job.mark_paused(reason, Utc::now());
        self.store.update_job(&job).await?;
        Ok(())
    }

    /// Resume a paused job back to `queued` — a resumed job re-enters
    /// through the admission gates rather than skipping back to `running`
    /// directly.
    pub async fn resume_job(&self, id: &JobId) -> Result<(), QueueError> {
        let mut job = self.store.get_job(id).await?;
        job.requeue(Utc::now());
        self.store.update_job(&job).await?;
        Ok(())
    }

    /// Terminal transition to `completed`.
    pub async fn complete_job(&self, id: &JobId) -> Result<(), QueueError> {
        let mut job = self.store.get_job(id).await?;
        job.mark_terminal(ix_core::JobStatus::Completed, None, Utc::now());
        self.store.update_job(&job).await?;
        Ok(())
    }

    /// Terminal transition to `failed`, recording `err` as the job's error text.
    pub async fn fail_job(&self, id: &JobId, err: impl Into<String>) -> Result<(), QueueError> {
        let mut job = self.store.get_job(id).await?;
        job.mark_terminal(ix_core::JobStatus::Failed, Some(err.into()), Utc::now());
        self.store.update_job(&job).await?;
        Ok(())
    }

    /// Delete the parent row and cancel (never fail) every non-terminal
    /// child with error text "parent job deleted". Completed children are
    /// left intact.
    pub async fn delete_job_with_children(&self, id: &JobId) -> Result<(), QueueError> {
        let children = self.store.list_tasks_by_parent(id).await?;
        for child in children {
            if child.status.is_terminal() {
                continue;
            }
            let mut child = child;
            child.mark_terminal(
                ix_core::JobStatus::Cancelled,
                Some("parent job deleted".to_string()),
                Utc::now(),
            );
            self.store.update_job(&child).await?;
        }
        self.store.delete_job(id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
