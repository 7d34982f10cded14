// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-dispatch admission gates. A denial pauses the job; it is never an
//! error surfaced up the call stack.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use ix_core::Clock;
use parking_lot::Mutex;

/// Denial marker returned by [`RateLimiter::allow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDenied;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitStats {
    pub in_window: u64,
    pub remaining: u64,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self) -> Result<(), RateLimitDenied>;
    fn stats(&self) -> RateLimitStats;
}

/// Denial marker returned by [`BudgetTracker::check_budget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetExceeded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BudgetStatus {
    pub daily_spend: f64,
    pub daily_remaining: f64,
    pub monthly_spend: f64,
    pub monthly_remaining: f64,
}

#[async_trait]
pub trait BudgetTracker: Send + Sync {
    async fn check_budget(&self, estimated: f64) -> Result<(), BudgetExceeded>;
    fn get_status(&self) -> BudgetStatus;
}

/// Reference `RateLimiter`: fixed capacity per rolling window, pruned
/// lazily on each call.
pub struct FixedWindowRateLimiter<C: Clock> {
    capacity: u64,
    window: Duration,
    clock: C,
    timestamps: Mutex<VecDeque<u64>>,
}

impl<C: Clock> FixedWindowRateLimiter<C> {
    pub fn new(capacity: u64, window: Duration, clock: C) -> Self {
        Self { capacity, window, clock, timestamps: Mutex::new(VecDeque::new()) }
    }

    fn prune(&self, ts: &mut VecDeque<u64>, now: u64) {
        let window_ms = self.window.as_millis() as u64;
        while let Some(&front) = ts.front() {
            if now.saturating_sub(front) > window_ms {
                ts.pop_front();
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl<C: Clock + 'static> RateLimiter for FixedWindowRateLimiter<C> {
    async fn allow(&self) -> Result<(), RateLimitDenied> {
        let now = self.clock.epoch_ms();
        let mut ts = self.timestamps.lock();
        self.prune(&mut ts, now);
        if ts.len() as u64 >= self.capacity {
            return Err(RateLimitDenied);
        }
        ts.push_back(now);
        Ok(())
    }

    fn stats(&self) -> RateLimitStats {
        let now = self.clock.epoch_ms();
        let mut ts = self.timestamps.lock();
        self.prune(&mut ts, now);
        let in_window = ts.len() as u64;
        RateLimitStats { in_window, remaining: self.capacity.saturating_sub(in_window) }
    }
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
