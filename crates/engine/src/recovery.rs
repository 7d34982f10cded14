// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan recovery: rows still marked `running` at process start, by
//! definition owned by a dead worker. Requeued in two throttled waves so a
//! crash on a loaded system does not re-admit everything at once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ix_storage::Store;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const MAX_ORPHANS_TO_RECOVER: usize = 1000;
const WARM_PHASE_MAX_JOBS: usize = 9;

/// Compute, for each of `total_remaining` jobs past the one requeued
/// synchronously, the delay from recovery start at which it should be
/// requeued: up to 9 jobs spread over the warm phase (`graceful_start_phase
/// / 5`), the rest spread uniformly over the slow phase (`graceful_start_phase
/// * 3`).
pub fn plan_requeue_delays(total_remaining: usize, graceful_start_phase: Duration) -> Vec<Duration> {
    if total_remaining == 0 {
        return Vec::new();
    }

    let warm_duration = graceful_start_phase / 5;
    let warm_count = total_remaining.min(WARM_PHASE_MAX_JOBS);
    let warm_interval = warm_duration / warm_count as u32;

    let mut delays = Vec::with_capacity(total_remaining);
    for i in 1..=warm_count {
        delays.push(warm_interval * i as u32);
    }

    let slow_count = total_remaining - warm_count;
    if slow_count > 0 {
        let slow_duration = graceful_start_phase * 3;
        let slow_interval = slow_duration / slow_count as u32;
        for j in 1..=slow_count {
            delays.push(warm_duration + slow_interval * j as u32);
        }
    }

    delays
}

/// Requeue every row still marked `running`, up to [`MAX_ORPHANS_TO_RECOVER`].
/// The first is requeued synchronously; the remainder are scheduled onto a
/// background task that exits early if `child` is cancelled. Returns the
/// total number of orphans found (not necessarily all requeued by the time
/// this returns).
pub async fn recover_orphans(
    store: Arc<dyn Store>,
    child: CancellationToken,
    graceful_start_phase: Duration,
) -> usize {
    let orphans = match store.list_running_jobs(MAX_ORPHANS_TO_RECOVER).await {
        Ok(jobs) => jobs,
        Err(err) => {
            warn!(error = %err, "orphan recovery failed to list running jobs");
            return 0;
        }
    };

    if orphans.is_empty() {
        return 0;
    }

    let total = orphans.len();
    let mut iter = orphans.into_iter();
    let Some(first) = iter.next() else { return total };
    requeue_one(&store, first).await;

    let remaining: Vec<_> = iter.collect();
    if !remaining.is_empty() {
        let delays = plan_requeue_delays(remaining.len(), graceful_start_phase);
        tokio::spawn(run_waves(store, child, remaining, delays));
    }

    total
}

async fn run_waves(
    store: Arc<dyn Store>,
    child: CancellationToken,
    jobs: Vec<ix_core::Job>,
    delays: Vec<Duration>,
) {
    let mut previous = Duration::ZERO;
    for (job, absolute_delay) in jobs.into_iter().zip(delays) {
        let wait = absolute_delay.saturating_sub(previous);
        previous = absolute_delay;

        tokio::select! {
            _ = child.cancelled() => {
                info!("orphan recovery aborted: pool shutting down");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }
        requeue_one(&store, job).await;
    }
}

async fn requeue_one(store: &Arc<dyn Store>, mut job: ix_core::Job) {
    let id = job.id.clone();
    job.requeue(Utc::now());
    if let Err(err) = store.update_job(&job).await {
        warn!(job_id = %id, error = %err, "failed to requeue orphaned job, skipping");
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
