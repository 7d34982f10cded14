// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage-layer error type.

use ix_core::JobId;
use thiserror::Error;

/// Errors surfaced by a [`crate::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// The underlying connection is closed. The worker loop treats this as
    /// a clean shutdown signal rather than a retryable failure.
    #[error("store connection closed")]
    Closed,

    #[error("storage backend error: {0}")]
    Backend(#[from] sqlx::Error),
}
