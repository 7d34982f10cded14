// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ix_core::JobError;
use ix_queue::QueueError;
use ix_storage::StoreError;
use thiserror::Error;

/// Errors from the pool-level lifecycle methods (`start`, `stop`). The
/// per-job path inside `process_next_job` never bubbles a `Result` this
/// far — failures there are recorded on the job row instead.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Job(#[from] JobError),
}

impl From<QueueError> for PoolError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Store(e) => PoolError::Store(e),
        }
    }
}
