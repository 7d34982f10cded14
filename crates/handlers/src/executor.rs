// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatches a job to its registered handler by `handler_name`.

use std::sync::Arc;

use ix_core::{Job, JobError};

use crate::handler::{Handler, HandlerContext};
use crate::registry::HandlerRegistry;

pub struct Executor {
    registry: Arc<HandlerRegistry>,
    fallback: Option<Arc<dyn Handler>>,
}

impl Executor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry, fallback: None }
    }

    /// Delegate to `fallback` when `handler_name` is set but not registered.
    pub fn with_fallback(mut self, fallback: Arc<dyn Handler>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub async fn execute(&self, ctx: &HandlerContext, job: &mut Job) -> Result<(), JobError> {
        let name = job
            .handler_name
            .as_ref()
            .map(|h| h.as_str())
            .unwrap_or("");
        if name.is_empty() {
            return Err(JobError::EmptyHandlerName);
        }

        if let Some(handler) = self.registry.get(name) {
            return handler.execute(ctx, job).await;
        }
        if let Some(fallback) = &self.fallback {
            return fallback.execute(ctx, job).await;
        }
        Err(JobError::HandlerNotFound(name.to_string()))
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
