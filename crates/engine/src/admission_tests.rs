// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use ix_core::FakeClock;

use super::{FixedWindowRateLimiter, RateLimiter};

#[tokio::test]
async fn capacity_k_allows_k_then_denies_the_next() {
    let clock = FakeClock::new();
    let limiter = FixedWindowRateLimiter::new(3, Duration::from_secs(60), clock);

    for _ in 0..3 {
        limiter.allow().await.expect("within capacity");
    }
    assert!(limiter.allow().await.is_err());
    assert_eq!(limiter.stats().in_window, 3);
    assert_eq!(limiter.stats().remaining, 0);
}

#[tokio::test]
async fn window_expiry_frees_capacity() {
    let clock = FakeClock::new();
    let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60), clock.clone());

    limiter.allow().await.unwrap();
    assert!(limiter.allow().await.is_err());

    clock.advance(Duration::from_secs(61));
    limiter.allow().await.expect("window has rolled over");
}
