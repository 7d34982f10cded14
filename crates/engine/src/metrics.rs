// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System memory probe and the pre-start worker-count advisor.

use sysinfo::System;

const RESERVED_BUFFER_GB: f64 = 2.0;
const PER_WORKER_ESTIMATE_GB: f64 = 5.0;
const MIN_RECOMMENDED_WORKERS: usize = 1;
const MAX_RECOMMENDED_WORKERS: usize = 10;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SystemMetrics {
    pub active_workers: u64,
    pub configured_workers: u64,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
    pub memory_percent: f64,
    pub jobs_queued: u64,
    pub jobs_running: u64,
}

/// Read host memory via `sysinfo`. A sandboxed host reporting zero totals
/// degrades to zero fields rather than erroring.
pub fn read_memory() -> (f64, f64, f64) {
    let mut system = System::new_all();
    system.refresh_memory();
    let total_gb = system.total_memory() as f64 / BYTES_PER_GB;
    let used_gb = system.used_memory() as f64 / BYTES_PER_GB;
    let percent = if total_gb > 0.0 { used_gb / total_gb * 100.0 } else { 0.0 };
    (used_gb, total_gb, percent)
}

/// Memory free for new workers right now, in GB: what the OS reports as
/// available, not simply total minus used (reclaimable cache counts as free).
fn available_memory_gb() -> f64 {
    let mut system = System::new_all();
    system.refresh_memory();
    system.available_memory() as f64 / BYTES_PER_GB
}

/// Recommended worker count given free system memory: reserve a fixed
/// buffer, divide the remainder per-worker, clamp to [1, 10].
pub fn recommended_worker_count(available_memory_gb: f64) -> usize {
    let usable = (available_memory_gb - RESERVED_BUFFER_GB).max(0.0);
    let recommended = (usable / PER_WORKER_ESTIMATE_GB).floor() as usize;
    recommended.clamp(MIN_RECOMMENDED_WORKERS, MAX_RECOMMENDED_WORKERS)
}

/// Non-fatal advisory: `Some(message)` if `configured_workers` exceeds the
/// recommendation for the host's available memory.
pub fn check_memory_pressure(configured_workers: usize) -> Option<String> {
    let available_gb = available_memory_gb();
    let recommended = recommended_worker_count(available_gb);
    if configured_workers > recommended {
        Some(format!(
            "configured worker count {configured_workers} exceeds the recommended {recommended} for {available_gb:.1} GB of available memory"
        ))
    } else {
        None
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
