// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entity and status state machine.

use crate::ids::{HandlerName, JobId, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum number of retries before a job is surfaced as failed.
pub const MAX_RETRIES: u32 = 2;

/// Status of a job. Initial state is `Queued`; terminal states are
/// `Completed`, `Failed`, and `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Scheduled,
}

crate::simple_display! {
    JobStatus {
        Queued => "queued",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        Scheduled => "scheduled",
    }
}

impl JobStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Only `Queued` jobs are eligible for dispatch.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Queued)
    }

    /// `Queued`, `Running`, `Paused` — the "active" set used by
    /// `ListActiveJobs` and deduplication lookups.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running | Self::Paused)
    }
}

/// Error returned when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "scheduled" => Self::Scheduled,
            other => return Err(ParseStatusError(other.to_string())),
        })
    }
}

/// Monotone progress counter within one job lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(current: u64, total: u64) -> Self {
        Self { current, total }
    }

    /// Add `delta` to `current`, saturating rather than overflowing.
    pub fn record(&mut self, delta: u64) {
        self.current = self.current.saturating_add(delta);
    }

    /// `true` once `current >= total` and `total > 0`.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.current >= self.total
    }

    /// Reset to zero, used when a retry restarts the unit of work.
    pub fn reset(&mut self) {
        self.current = 0;
    }
}

/// Periodic snapshot of rate/budget accounting, attached to a job row for
/// observability. Every field is optional so a job with no admission
/// gates configured carries an empty pulse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PulseState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls_in_window: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls_remaining: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spend_today: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spend_month: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_remaining: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<String>,
}

/// One unit of durable asynchronous work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_name: Option<HandlerName>,
    pub source: Source,
    pub status: JobStatus,
    pub progress: Progress,
    pub cost_estimate: f64,
    pub cost_actual: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_state: Option<PulseState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_job_id: Option<JobId>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Construct a new queued job. `created_at`/`updated_at` are set to
    /// `now`; all other timestamps start unset.
    pub fn new(
        id: impl Into<JobId>,
        handler_name: Option<HandlerName>,
        source: impl Into<Source>,
        payload: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            handler_name,
            source: source.into(),
            status: JobStatus::Queued,
            progress: Progress::default(),
            cost_estimate: 0.0,
            cost_actual: 0.0,
            pulse_state: None,
            payload,
            error: None,
            parent_job_id: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    crate::setters! {
        set { cost_estimate: f64 }
        option { handler_name: HandlerName, parent_job_id: JobId }
    }

    /// Transition to `Running`, stamping `started_at` on the first call only.
    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.status = JobStatus::Running;
        self.updated_at = now;
    }

    /// Transition to one of the terminal statuses, stamping `completed_at`.
    pub fn mark_terminal(&mut self, status: JobStatus, error: Option<String>, now: DateTime<Utc>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.error = error;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Transition to `Paused`, recording the reason as the job's error text.
    pub fn mark_paused(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.status = JobStatus::Paused;
        self.error = Some(reason.into());
        self.updated_at = now;
    }

    /// Transition back to `Queued`, clearing any stale error text. Used by
    /// resume, retry, graceful cancellation, and orphan recovery.
    pub fn requeue(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Queued;
        self.error = None;
        self.updated_at = now;
    }

    /// `true` iff `retry_count` has not yet exceeded `MAX_RETRIES`.
    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_RETRIES
    }

    /// Increment the retry counter, reset to queued, and annotate the
    /// error text with "retry k/MaxRetries" per the retry policy.
    pub fn retry(&mut self, err: &str, now: DateTime<Utc>) {
        self.retry_count += 1;
        self.error = Some(format!("{err} (retry {}/{MAX_RETRIES})", self.retry_count));
        self.status = JobStatus::Queued;
        self.updated_at = now;
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct JobBuilder {
    id: JobId,
    handler_name: Option<HandlerName>,
    source: Source,
    status: JobStatus,
    payload: Vec<u8>,
    parent_job_id: Option<JobId>,
    retry_count: u32,
    now: DateTime<Utc>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for JobBuilder {
    fn default() -> Self {
        Self {
            id: JobId::from("job-test"),
            handler_name: Some(HandlerName::from("test.handler")),
            source: Source::from("test://source"),
            status: JobStatus::Queued,
            payload: Vec::new(),
            parent_job_id: None,
            retry_count: 0,
            now: Utc::now(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl JobBuilder {
    pub fn id(mut self, v: impl Into<JobId>) -> Self {
        self.id = v.into();
        self
    }

    pub fn handler_name(mut self, v: impl Into<HandlerName>) -> Self {
        self.handler_name = Some(v.into());
        self
    }

    pub fn source(mut self, v: impl Into<Source>) -> Self {
        self.source = v.into();
        self
    }

    pub fn status(mut self, v: JobStatus) -> Self {
        self.status = v;
        self
    }

    pub fn payload(mut self, v: Vec<u8>) -> Self {
        self.payload = v;
        self
    }

    pub fn parent_job_id(mut self, v: impl Into<JobId>) -> Self {
        self.parent_job_id = Some(v.into());
        self
    }

    pub fn retry_count(mut self, v: u32) -> Self {
        self.retry_count = v;
        self
    }

    pub fn created_at(mut self, v: DateTime<Utc>) -> Self {
        self.now = v;
        self
    }

    pub fn build(self) -> Job {
        let mut job = Job::new(self.id, self.handler_name, self.source, self.payload, self.now);
        job.status = self.status;
        job.parent_job_id = self.parent_job_id;
        job.retry_count = self.retry_count;
        if matches!(self.status, JobStatus::Running) {
            job.started_at = Some(self.now);
        }
        job
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Job {
    pub fn builder() -> JobBuilder {
        JobBuilder::default()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
