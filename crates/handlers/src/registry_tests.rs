// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use async_trait::async_trait;
use ix_core::{Job, JobError};

use super::HandlerRegistry;
use crate::handler::{Handler, HandlerContext};

struct NoopHandler(&'static str);

#[async_trait]
impl Handler for NoopHandler {
    async fn execute(&self, _ctx: &HandlerContext, _job: &mut Job) -> Result<(), JobError> {
        Ok(())
    }

    fn name(&self) -> &str {
        self.0
    }
}

#[test]
fn register_then_get_round_trips() {
    let registry = HandlerRegistry::new();
    registry.register(Arc::new(NoopHandler("role.jd-ingestion"))).unwrap();

    assert!(registry.has("role.jd-ingestion"));
    assert!(registry.get("role.jd-ingestion").is_some());
    assert_eq!(registry.names(), vec!["role.jd-ingestion".to_string()]);
}

#[test]
fn duplicate_registration_is_an_error() {
    let registry = HandlerRegistry::new();
    registry.register(Arc::new(NoopHandler("dup"))).unwrap();

    let err = registry.register(Arc::new(NoopHandler("dup"))).unwrap_err();
    assert!(matches!(err, JobError::DuplicateHandler(name) if name == "dup"));
}

#[test]
fn unknown_name_is_absent() {
    let registry = HandlerRegistry::new();
    assert!(!registry.has("missing"));
    assert!(registry.get("missing").is_none());
}
