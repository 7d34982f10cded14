// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The handler contract: a named, user-supplied executor that consumes a
//! job and returns success or error.

use async_trait::async_trait;
use ix_core::{Job, JobError};
use tokio_util::sync::CancellationToken;

use crate::emitter::ProgressEmitter;

/// Capability bundle handed to a handler for the duration of one run —
/// narrower than the whole pool, matching the worker's own scope.
pub struct HandlerContext {
    pub cancellation: CancellationToken,
    pub progress: ProgressEmitter,
}

impl HandlerContext {
    pub fn new(cancellation: CancellationToken, progress: ProgressEmitter) -> Self {
        Self { cancellation, progress }
    }

    /// Convenience for handlers that want to check cancellation between units
    /// of work without reaching into the token directly.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    /// Perform one unit of durable work. Implementations must check
    /// `ctx.is_cancelled()` between steps and return promptly with `job`
    /// left in a state consistent for re-queue.
    async fn execute(&self, ctx: &HandlerContext, job: &mut Job) -> Result<(), JobError>;

    fn name(&self) -> &str;
}
