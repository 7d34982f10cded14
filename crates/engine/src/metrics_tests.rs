// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::recommended_worker_count;

#[test]
fn recommendation_reserves_buffer_then_divides_per_worker() {
    assert_eq!(recommended_worker_count(7.0), 1); // (7-2)/5 = 1
    assert_eq!(recommended_worker_count(12.0), 2); // (12-2)/5 = 2
    assert_eq!(recommended_worker_count(52.0), 10); // (52-2)/5 = 10
}

#[test]
fn recommendation_clamps_to_one_and_ten() {
    assert_eq!(recommended_worker_count(0.0), 1);
    assert_eq!(recommended_worker_count(1000.0), 10);
}
