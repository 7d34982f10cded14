// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios run against `MemoryStore`, exercising the full
//! Store → Queue → WorkerPool stack together rather than one crate at a
//! time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use ix_core::{FakeClock, Job, JobError, JobStatus};
use ix_handlers::{Handler, HandlerContext, HandlerRegistry};
use ix_queue::Queue;
use ix_storage::{MemoryStore, Store};
use ix_engine::{FixedWindowRateLimiter, PoolConfig, WorkerPool};
use tokio_util::sync::CancellationToken;

struct ImmediateSuccess;

#[async_trait]
impl Handler for ImmediateSuccess {
    async fn execute(&self, _ctx: &HandlerContext, _job: &mut Job) -> Result<(), JobError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "role.jd-ingestion"
    }
}

struct FiveStepCooperative {
    step_millis: u64,
}

#[async_trait]
impl Handler for FiveStepCooperative {
    async fn execute(&self, ctx: &HandlerContext, job: &mut Job) -> Result<(), JobError> {
        for _ in 0..5 {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled("cancelled mid-run".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(self.step_millis)).await;
            job.progress.record(1);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cooperative.five-step"
    }
}

// 1. Deduplication.
#[tokio::test]
async fn deduplication_returns_newest_active_then_falls_back() {
    let store = MemoryStore::default();

    let older = Job::builder()
        .id("older")
        .handler_name("role.jd-ingestion")
        .source("https://x/j/1")
        .created_at(Utc::now() - ChronoDuration::seconds(10))
        .build();
    let newer = Job::builder()
        .id("newer")
        .handler_name("role.jd-ingestion")
        .source("https://x/j/1")
        .build();
    store.create_job(&older).await.unwrap();
    store.create_job(&newer).await.unwrap();

    let found = store
        .find_active_job_by_source_and_handler(&"https://x/j/1".into(), &"role.jd-ingestion".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, newer.id);

    let mut completed_newer = newer.clone();
    completed_newer.mark_terminal(JobStatus::Completed, None, Utc::now());
    store.update_job(&completed_newer).await.unwrap();

    let found = store
        .find_active_job_by_source_and_handler(&"https://x/j/1".into(), &"role.jd-ingestion".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, older.id);

    let mut completed_older = older.clone();
    completed_older.mark_terminal(JobStatus::Completed, None, Utc::now());
    store.update_job(&completed_older).await.unwrap();

    let found = store
        .find_active_job_by_source_and_handler(&"https://x/j/1".into(), &"role.jd-ingestion".into())
        .await
        .unwrap();
    assert!(found.is_none());
}

// 2. LIFO dispatch.
#[tokio::test]
async fn lifo_dispatch_returns_c_b_a() {
    let store = Arc::new(MemoryStore::default());
    let queue = Queue::new(store.clone());

    let now = Utc::now();
    let a = Job::builder().id("a").created_at(now - ChronoDuration::seconds(2)).build();
    let b = Job::builder().id("b").created_at(now - ChronoDuration::seconds(1)).build();
    let c = Job::builder().id("c").created_at(now).build();
    for job in [&a, &b, &c] {
        queue.enqueue(job).await.unwrap();
    }

    let first = queue.dequeue().await.unwrap().unwrap();
    let second = queue.dequeue().await.unwrap().unwrap();
    let third = queue.dequeue().await.unwrap().unwrap();
    assert_eq!([first.id, second.id, third.id], [c.id, b.id, a.id]);
}

// 3. Cascade delete.
#[tokio::test]
async fn cascade_delete_cancels_non_terminal_children_only() {
    let store = Arc::new(MemoryStore::default());
    let queue = Queue::new(store.clone());

    let parent = Job::builder().id("P").status(JobStatus::Running).build();
    store.create_job(&parent).await.unwrap();
    let children = [
        Job::builder().id("Q").status(JobStatus::Queued).parent_job_id("P").build(),
        Job::builder().id("R").status(JobStatus::Running).parent_job_id("P").build(),
        Job::builder().id("S").status(JobStatus::Paused).parent_job_id("P").build(),
        Job::builder().id("T").status(JobStatus::Completed).parent_job_id("P").build(),
    ];
    for child in &children {
        store.create_job(child).await.unwrap();
    }

    queue.delete_job_with_children(&parent.id).await.unwrap();

    assert!(store.get_job(&parent.id).await.is_err());
    for id in ["Q", "R", "S"] {
        let child = store.get_job(&id.into()).await.unwrap();
        assert_eq!(child.status, JobStatus::Cancelled);
        assert_eq!(child.error.as_deref(), Some("parent job deleted"));
    }
    let t = store.get_job(&"T".into()).await.unwrap();
    assert_eq!(t.status, JobStatus::Completed);
}

// 4. Graceful shutdown.
#[tokio::test]
async fn graceful_shutdown_requeues_a_running_job_within_two_seconds() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
    let job = Job::builder().id("j1").handler_name("cooperative.five-step").build();
    store.create_job(&job).await.unwrap();

    let registry = Arc::new(HandlerRegistry::new());
    registry
        .register(Arc::new(FiveStepCooperative { step_millis: 5 }))
        .unwrap();

    let parent = CancellationToken::new();
    let config = PoolConfig {
        workers: 1,
        poll_interval: Some(Duration::from_millis(5)),
        pause_on_budget: true,
        graceful_start_phase: Duration::from_millis(50),
    };
    let pool = WorkerPool::with_clock(parent.clone(), store.clone(), registry, config, FakeClock::new());
    pool.start().await.unwrap();

    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(2)).await;
        if store.get_job(&job.id).await.unwrap().status == JobStatus::Running {
            break;
        }
    }
    parent.cancel();

    for _ in 0..400 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if store.get_job(&job.id).await.unwrap().status != JobStatus::Running {
            break;
        }
    }
    pool.stop().await;

    let final_job = store.get_job(&job.id).await.unwrap();
    assert_eq!(final_job.status, JobStatus::Queued);
    assert!(final_job.error.is_none());
}

// 5. Orphan recovery.
#[tokio::test]
async fn orphan_recovery_requeues_all_twelve_running_jobs() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
    for i in 0..12 {
        let job = Job::builder().id(format!("orphan-{i}")).status(JobStatus::Running).build();
        store.create_job(&job).await.unwrap();
    }

    let registry = Arc::new(HandlerRegistry::new());
    let parent = CancellationToken::new();
    let config = PoolConfig {
        workers: 2,
        poll_interval: Some(Duration::from_millis(5)),
        pause_on_budget: true,
        graceful_start_phase: Duration::from_millis(200),
    };
    let pool = WorkerPool::with_clock(parent.clone(), store.clone(), registry, config, FakeClock::new());
    pool.start().await.unwrap();

    // At least one orphan requeued almost immediately.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let queued_early = store.list_jobs(Some(JobStatus::Queued), 20).await.unwrap().len();
    assert!(queued_early >= 1);

    // All twelve eventually leave `running`.
    let mut remaining_running = 12;
    for _ in 0..400 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        remaining_running = store.list_running_jobs(20).await.unwrap().len();
        if remaining_running == 0 {
            break;
        }
    }
    pool.stop().await;
    assert_eq!(remaining_running, 0);
}

// 6. Rate-limit pause.
#[tokio::test]
async fn fourth_job_within_the_window_is_paused_before_any_handler_runs() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
    let run_count = Arc::new(AtomicU32::new(0));

    struct CountingHandler(Arc<AtomicU32>);
    #[async_trait]
    impl Handler for CountingHandler {
        async fn execute(&self, _ctx: &HandlerContext, _job: &mut Job) -> Result<(), JobError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn name(&self) -> &str {
            "role.jd-ingestion"
        }
    }

    for i in 0..4 {
        let job = Job::builder()
            .id(format!("j{i}"))
            .handler_name("role.jd-ingestion")
            .build();
        store.create_job(&job).await.unwrap();
    }

    let registry = Arc::new(HandlerRegistry::new());
    registry.register(Arc::new(CountingHandler(run_count.clone()))).unwrap();

    let clock = FakeClock::new();
    let limiter = Arc::new(FixedWindowRateLimiter::new(3, Duration::from_secs(60), clock.clone()));

    let parent = CancellationToken::new();
    let config = PoolConfig {
        workers: 1,
        poll_interval: Some(Duration::from_millis(5)),
        pause_on_budget: true,
        graceful_start_phase: Duration::from_millis(50),
    };
    let pool = WorkerPool::with_clock(parent.clone(), store.clone(), registry, config, clock)
        .with_rate_limiter(limiter);
    pool.start().await.unwrap();

    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let counts = store.job_counts().await.unwrap();
        if counts.queued == 0 && counts.running == 0 {
            break;
        }
    }
    pool.stop().await;

    assert_eq!(run_count.load(Ordering::SeqCst), 3);
    let mut paused = 0;
    for i in 0..4 {
        let job = store.get_job(&format!("j{i}").into()).await.unwrap();
        if job.status == JobStatus::Paused {
            paused += 1;
            assert_eq!(job.error.as_deref(), Some("rate_limited"));
        }
    }
    assert_eq!(paused, 1);
}
