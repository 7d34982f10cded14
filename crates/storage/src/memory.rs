// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`Store`] for fast unit tests and for embedding this engine
//! without a database. Mirrors the ordering and dedup semantics of
//! [`crate::postgres::PgStore`] exactly so behavioral tests can run
//! against either backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ix_core::{HandlerName, Job, JobId, JobStatus, Source};
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::store::{JobCounts, Store};

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Job>>,
    closed: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the underlying connection closing, so subsequent calls
    /// return `StoreError::Closed` — used to exercise the worker loop's
    /// clean-shutdown-on-closed-store path.
    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_closed(&self) -> Result<(), StoreError> {
        if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_job(&self, job: &Job) -> Result<(), StoreError> {
        self.check_closed()?;
        self.rows.lock().push(job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Job, StoreError> {
        self.check_closed()?;
        self.rows
            .lock()
            .iter()
            .find(|j| &j.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        self.check_closed()?;
        let mut rows = self.rows.lock();
        let existing = rows
            .iter_mut()
            .find(|j| j.id == job.id)
            .ok_or_else(|| StoreError::NotFound(job.id.clone()))?;
        let mut updated = job.clone();
        updated.updated_at = Utc::now();
        *existing = updated;
        Ok(())
    }

    async fn delete_job(&self, id: &JobId) -> Result<(), StoreError> {
        self.check_closed()?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|j| &j.id != id);
        if rows.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn list_jobs(&self, status: Option<JobStatus>, limit: usize) -> Result<Vec<Job>, StoreError> {
        self.check_closed()?;
        let rows = self.rows.lock();
        let mut out: Vec<Job> = rows
            .iter()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn list_active_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        self.check_closed()?;
        let rows = self.rows.lock();
        let mut out: Vec<Job> = rows.iter().filter(|j| j.status.is_active()).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn list_running_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        self.check_closed()?;
        let rows = self.rows.lock();
        let mut out: Vec<Job> = rows
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn list_tasks_by_parent(&self, parent_id: &JobId) -> Result<Vec<Job>, StoreError> {
        self.check_closed()?;
        let rows = self.rows.lock();
        let mut out: Vec<Job> = rows
            .iter()
            .filter(|j| j.parent_job_id.as_ref() == Some(parent_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn cleanup_old_jobs(&self, age: Duration) -> Result<u64, StoreError> {
        self.check_closed()?;
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::MAX);
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|j| {
            !(j.status.is_terminal() && j.completed_at.is_some_and(|c| c < cutoff))
        });
        Ok((before - rows.len()) as u64)
    }

    async fn find_active_job_by_source_and_handler(
        &self,
        source: &Source,
        handler: &HandlerName,
    ) -> Result<Option<Job>, StoreError> {
        self.check_closed()?;
        let rows = self.rows.lock();
        let mut matches: Vec<&Job> = rows
            .iter()
            .filter(|j| {
                &j.source == source
                    && j.handler_name.as_ref() == Some(handler)
                    && j.status.is_active()
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches.first().map(|j| (*j).clone()))
    }

    async fn find_recent_job_by_source_and_handler(
        &self,
        source: &Source,
        handler: &HandlerName,
        window: Duration,
    ) -> Result<Option<Job>, StoreError> {
        self.check_closed()?;
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let rows = self.rows.lock();
        let mut matches: Vec<&Job> = rows
            .iter()
            .filter(|j| {
                &j.source == source
                    && j.handler_name.as_ref() == Some(handler)
                    && j.status.is_terminal()
                    && j.completed_at.is_some_and(|c| c >= cutoff)
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches.first().map(|j| (*j).clone()))
    }

    async fn job_counts(&self) -> Result<JobCounts, StoreError> {
        self.check_closed()?;
        let rows = self.rows.lock();
        let mut counts = JobCounts::default();
        for j in rows.iter() {
            match j.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Running => counts.running += 1,
                _ => {}
            }
        }
        Ok(counts)
    }

    async fn dequeue(&self) -> Result<Option<Job>, StoreError> {
        self.check_closed()?;
        let mut rows = self.rows.lock();
        let idx = rows
            .iter()
            .enumerate()
            .filter(|(_, j)| j.status == JobStatus::Queued)
            .max_by_key(|(_, j)| j.created_at)
            .map(|(i, _)| i);
        let Some(idx) = idx else { return Ok(None) };
        let now = Utc::now();
        rows[idx].mark_running(now);
        Ok(Some(rows[idx].clone()))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
