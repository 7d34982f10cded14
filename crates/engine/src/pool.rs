// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler: N parallel worker tasks pulling from a shared [`Queue`],
//! gated by optional rate-limit/budget admission checks, rooted at a
//! caller-provided cancellation context.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use ix_core::{Clock, Job, JobStatus, SystemClock};
use ix_handlers::{Broadcaster, Executor, HandlerContext, HandlerRegistry, ProgressEmitter};
use ix_queue::Queue;
use ix_storage::{Store, StoreError};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admission::{BudgetTracker, RateLimiter};
use crate::error::PoolError;
use crate::metrics::{check_memory_pressure, read_memory, SystemMetrics};
use crate::recovery::recover_orphans;

const STOP_TIMEOUT: Duration = Duration::from_secs(30);
const WARMUP_JOB_COUNT: u64 = 20;
const WARMUP_DURATION: Duration = Duration::from_secs(120);
const FAST_TICK: Duration = Duration::from_secs(1);
const SLOW_TICK: Duration = Duration::from_secs(5);
const CONSECUTIVE_ERRORS_BEFORE_BACKOFF: u32 = 5;
const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: usize,
    pub poll_interval: Option<Duration>,
    pub pause_on_budget: bool,
    pub graceful_start_phase: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            poll_interval: None,
            pause_on_budget: true,
            graceful_start_phase: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    jobs_processed: u64,
    active_workers: u64,
    start_time: Option<Instant>,
}

struct Inner<C: Clock> {
    parent: CancellationToken,
    child: Mutex<CancellationToken>,
    counters: Mutex<PoolCounters>,
    store: Arc<dyn Store>,
    queue: Queue,
    executor: Executor,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    budget_tracker: Option<Arc<dyn BudgetTracker>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    config: PoolConfig,
    clock: C,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Clock> Inner<C> {
    fn child_token(&self) -> CancellationToken {
        self.child.lock().clone()
    }

    fn is_cancelled(&self) -> bool {
        self.child_token().is_cancelled()
    }

    fn adaptive_interval(&self) -> Duration {
        if let Some(interval) = self.config.poll_interval {
            return interval;
        }
        let counters = self.counters.lock();
        let uptime = counters
            .start_time
            .map(|start| self.clock.now().saturating_duration_since(start))
            .unwrap_or_default();
        if counters.jobs_processed < WARMUP_JOB_COUNT || uptime < WARMUP_DURATION {
            FAST_TICK
        } else {
            SLOW_TICK
        }
    }

    fn snapshot_pulse(&self, job: &mut Job) {
        let mut pulse = ix_core::PulseState::default();
        if let Some(limiter) = &self.rate_limiter {
            let stats = limiter.stats();
            pulse.calls_in_window = Some(stats.in_window);
            pulse.calls_remaining = Some(stats.remaining);
        }
        if let Some(tracker) = &self.budget_tracker {
            let status = tracker.get_status();
            pulse.spend_today = Some(status.daily_spend);
            pulse.spend_month = Some(status.monthly_spend);
            pulse.budget_remaining = Some(status.daily_remaining.min(status.monthly_remaining));
        }
        pulse.is_paused = Some(false);
        job.pulse_state = Some(pulse);
    }

    /// Dequeue, gate, dispatch, and resolve one job.
    async fn process_next_job(&self) -> Result<(), PoolError> {
        if self.is_cancelled() {
            return Ok(());
        }

        let mut job = match self.queue.dequeue().await? {
            Some(job) => job,
            None => return Ok(()),
        };

        if let Some(limiter) = &self.rate_limiter {
            if limiter.allow().await.is_err() {
                self.queue.pause_job(&job.id, "rate_limited").await?;
                return Ok(());
            }
        }

        if let Some(tracker) = &self.budget_tracker {
            if tracker.check_budget(job.cost_estimate).await.is_err() {
                if self.config.pause_on_budget {
                    self.queue.pause_job(&job.id, "budget_exceeded").await?;
                } else {
                    self.queue.fail_job(&job.id, "budget_exceeded").await?;
                }
                return Ok(());
            }
        }

        self.snapshot_pulse(&mut job);
        self.store.update_job(&job).await?;

        self.counters.lock().jobs_processed += 1;

        if let Some(parent_id) = job.parent_job_id.clone() {
            match self.store.get_job(&parent_id).await {
                Ok(parent) if parent.status == JobStatus::Failed || parent.status == JobStatus::Cancelled => {
                    job.mark_terminal(
                        JobStatus::Cancelled,
                        Some(format!("parent job {}", parent.status)),
                        chrono::Utc::now(),
                    );
                    self.store.update_job(&job).await?;
                    return Ok(());
                }
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    job.mark_terminal(
                        JobStatus::Cancelled,
                        Some("parent job deleted".to_string()),
                        chrono::Utc::now(),
                    );
                    self.store.update_job(&job).await?;
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.counters.lock().active_workers += 1;
        let _guard = ActiveGuard { counters: &self.counters };

        let ctx = HandlerContext::new(
            self.child_token(),
            ProgressEmitter::new(self.store.clone(), job.id.clone(), self.broadcaster.clone()),
        );

        let result = self.executor.execute(&ctx, &mut job).await;
        // Persist the handler's in-place mutations (progress, cost_actual,
        // resume-state payload) before any terminal transition, which
        // otherwise re-fetches the row by id and would clobber them.
        if let Err(persist_err) = self.store.update_job(&job).await {
            warn!(job_id = %job.id, error = %persist_err, "failed to persist handler output");
        }

        match result {
            Ok(()) => {
                self.queue.complete_job(&job.id).await?;
            }
            Err(err) => {
                if self.is_cancelled() {
                    info!(job_id = %job.id, "handler returned under cancellation, re-queuing");
                    job.requeue(chrono::Utc::now());
                    if let Err(update_err) = self.store.update_job(&job).await {
                        warn!(job_id = %job.id, error = %update_err, "failed to re-queue cancelled job");
                    }
                } else {
                    let classified = ix_core::classify("execute", &err.to_string());
                    if classified.retryable && job.can_retry() {
                        job.retry(&classified.message, chrono::Utc::now());
                        self.store.update_job(&job).await?;
                    } else {
                        self.queue.fail_job(&job.id, classified.message).await?;
                    }
                }
            }
        }

        Ok(())
    }
}

struct ActiveGuard<'a> {
    counters: &'a Mutex<PoolCounters>,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.counters.lock().active_workers -= 1;
    }
}

pub struct WorkerPool<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for WorkerPool<C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl WorkerPool<SystemClock> {
    pub fn new(
        parent: CancellationToken,
        store: Arc<dyn Store>,
        registry: Arc<HandlerRegistry>,
        config: PoolConfig,
    ) -> Self {
        Self::with_clock(parent, store, registry, config, SystemClock)
    }
}

impl<C: Clock> WorkerPool<C> {
    pub fn with_clock(
        parent: CancellationToken,
        store: Arc<dyn Store>,
        registry: Arc<HandlerRegistry>,
        config: PoolConfig,
        clock: C,
    ) -> Self {
        let child = parent.child_token();
        let queue = Queue::new(store.clone());
        Self {
            inner: Arc::new(Inner {
                parent,
                child: Mutex::new(child),
                counters: Mutex::new(PoolCounters::default()),
                store,
                queue,
                executor: Executor::new(registry),
                rate_limiter: None,
                budget_tracker: None,
                broadcaster: None,
                config,
                clock,
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Only has an effect when called before the pool is cloned or started;
    /// building fresh and chaining these immediately guarantees that.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.rate_limiter = Some(limiter),
            None => warn!("with_rate_limiter called after the pool was shared; ignoring"),
        }
        self
    }

    pub fn with_budget_tracker(mut self, tracker: Arc<dyn BudgetTracker>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.budget_tracker = Some(tracker),
            None => warn!("with_budget_tracker called after the pool was shared; ignoring"),
        }
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.broadcaster = Some(broadcaster),
            None => warn!("with_broadcaster called after the pool was shared; ignoring"),
        }
        self
    }
}

impl<C: Clock + 'static> WorkerPool<C> {
    /// Derive a fresh child context if needed, recover orphans, warn on
    /// memory pressure, then spawn the configured number of worker tasks.
    pub async fn start(&self) -> Result<(), PoolError> {
        {
            let mut child = self.inner.child.lock();
            if child.is_cancelled() {
                *child = self.inner.parent.child_token();
            }
        }
        {
            let mut counters = self.inner.counters.lock();
            counters.jobs_processed = 0;
            counters.start_time = Some(self.inner.clock.now());
        }

        recover_orphans(
            self.inner.store.clone(),
            self.inner.child_token(),
            self.inner.config.graceful_start_phase,
        )
        .await;

        if let Some(message) = check_memory_pressure(self.inner.config.workers) {
            warn!(message = %message, "worker pool starting above the recommended worker count");
        }

        let worker_id = Arc::new(AtomicUsize::new(0));
        let mut handles = self.inner.handles.lock();
        handles.clear();
        for _ in 0..self.inner.config.workers {
            let id = worker_id.fetch_add(1, Ordering::Relaxed);
            let inner = self.inner.clone();
            handles.push(tokio::spawn(worker_loop(inner, id)));
        }

        Ok(())
    }

    /// Cancel the child context and wait up to 30 seconds for workers to drain.
    pub async fn stop(&self) {
        self.inner.child.lock().cancel();
        let handles: Vec<_> = std::mem::take(&mut *self.inner.handles.lock());
        if tokio::time::timeout(STOP_TIMEOUT, join_all(handles)).await.is_err() {
            warn!("worker pool did not drain within the stop timeout");
        }
    }

    pub async fn system_metrics(&self) -> SystemMetrics {
        let (jobs_queued, jobs_running) = match self.inner.store.job_counts().await {
            Ok(counts) => (counts.queued, counts.running),
            Err(_) => (0, 0),
        };
        let (memory_used_gb, memory_total_gb, memory_percent) = read_memory();
        let active_workers = self.inner.counters.lock().active_workers;
        SystemMetrics {
            active_workers,
            configured_workers: self.inner.config.workers as u64,
            memory_used_gb,
            memory_total_gb,
            memory_percent,
            jobs_queued,
            jobs_running,
        }
    }
}

async fn worker_loop<C: Clock + 'static>(inner: Arc<Inner<C>>, worker_id: usize) {
    let mut consecutive_errors: u32 = 0;
    let mut backoff = BACKOFF_START;

    loop {
        let child = inner.child_token();
        if child.is_cancelled() {
            return;
        }

        let interval = inner.adaptive_interval();
        tokio::select! {
            _ = child.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        match inner.process_next_job().await {
            Ok(()) => {
                consecutive_errors = 0;
                backoff = BACKOFF_START;
            }
            Err(err) => {
                if inner.is_cancelled() || matches!(err, PoolError::Store(StoreError::Closed)) {
                    return;
                }
                warn!(worker = worker_id, error = %err, "worker failed to process next job");
                consecutive_errors += 1;
                if consecutive_errors >= CONSECUTIVE_ERRORS_BEFORE_BACKOFF {
                    tokio::select! {
                        _ = child.cancelled() => return,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
