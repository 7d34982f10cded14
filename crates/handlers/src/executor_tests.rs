// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use async_trait::async_trait;
use ix_core::{Job, JobError};
use ix_storage::MemoryStore;
use tokio_util::sync::CancellationToken;

use super::Executor;
use crate::emitter::ProgressEmitter;
use crate::handler::{Handler, HandlerContext};
use crate::registry::HandlerRegistry;

struct MarkRun(&'static str);

#[async_trait]
impl Handler for MarkRun {
    async fn execute(&self, _ctx: &HandlerContext, job: &mut Job) -> Result<(), JobError> {
        job.progress.record(1);
        Ok(())
    }

    fn name(&self) -> &str {
        self.0
    }
}

struct AlwaysFallback;

#[async_trait]
impl Handler for AlwaysFallback {
    async fn execute(&self, _ctx: &HandlerContext, job: &mut Job) -> Result<(), JobError> {
        job.error = Some("handled by fallback".to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

fn ctx() -> HandlerContext {
    let store = Arc::new(MemoryStore::default());
    HandlerContext::new(
        CancellationToken::new(),
        ProgressEmitter::new(store, "job-1".into(), None),
    )
}

#[tokio::test]
async fn dispatches_to_registered_handler_by_name() {
    let registry = Arc::new(HandlerRegistry::new());
    registry.register(Arc::new(MarkRun("role.jd-ingestion"))).unwrap();
    let executor = Executor::new(registry);

    let mut job = Job::builder().handler_name("role.jd-ingestion").build();
    executor.execute(&ctx(), &mut job).await.unwrap();
    assert_eq!(job.progress.current, 1);
}

#[tokio::test]
async fn empty_handler_name_is_always_an_error() {
    let registry = Arc::new(HandlerRegistry::new());
    let executor = Executor::new(registry);

    let mut job = Job::builder().build();
    job.handler_name = None;
    let err = executor.execute(&ctx(), &mut job).await.unwrap_err();
    assert!(matches!(err, JobError::EmptyHandlerName));
}

#[tokio::test]
async fn missing_handler_without_fallback_fails() {
    let registry = Arc::new(HandlerRegistry::new());
    let executor = Executor::new(registry);

    let mut job = Job::builder().handler_name("nobody.home").build();
    let err = executor.execute(&ctx(), &mut job).await.unwrap_err();
    assert!(matches!(err, JobError::HandlerNotFound(name) if name == "nobody.home"));
}

#[tokio::test]
async fn missing_handler_with_fallback_delegates() {
    let registry = Arc::new(HandlerRegistry::new());
    let executor = Executor::new(registry).with_fallback(Arc::new(AlwaysFallback));

    let mut job = Job::builder().handler_name("nobody.home").build();
    executor.execute(&ctx(), &mut job).await.unwrap();
    assert_eq!(job.error.as_deref(), Some("handled by fallback"));
}
