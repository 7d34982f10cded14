// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain-agnostic progress façade handed to handlers. Persist failures
//! here are logged and swallowed — the handler owns the authoritative
//! failure path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ix_core::{classify, JobId};
use ix_storage::Store;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// One broadcastable event, serialised as `{type, timestamp, data}` over
/// whatever sidechannel the embedder wires up.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub data: Value,
}

/// Narrow, optional capability — a missing broadcaster is the default
/// (batch/CLI embedding), not an error.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, event: BroadcastEvent);
}

pub struct ProgressEmitter {
    store: Arc<dyn Store>,
    job_id: JobId,
    broadcaster: Option<Arc<dyn Broadcaster>>,
}

impl ProgressEmitter {
    pub fn new(store: Arc<dyn Store>, job_id: JobId, broadcaster: Option<Arc<dyn Broadcaster>>) -> Self {
        Self { store, job_id, broadcaster }
    }

    async fn persist(&self, job: &ix_core::Job) {
        if let Err(err) = self.store.update_job(job).await {
            warn!(job_id = %self.job_id, error = %err, "progress emitter failed to persist job");
        }
    }

    /// Persist current job state with no progress delta.
    pub async fn emit_stage(&self, job: &mut ix_core::Job, _stage: &str, _message: &str) {
        self.persist(job).await;
    }

    /// Add `count` to `progress.current` and persist. `metadata` is
    /// observational only and not currently stored.
    pub async fn emit_progress(&self, job: &mut ix_core::Job, count: u64, _metadata: Option<Value>) {
        job.progress.record(count);
        self.persist(job).await;
    }

    /// Classify `err`, record it on the job, persist, and broadcast if a
    /// sink is configured.
    pub async fn emit_error(&self, job: &mut ix_core::Job, stage: &str, err: &str) {
        let ctx = classify(stage, err);
        job.error = Some(ctx.message.clone());
        self.persist(job).await;

        if let Some(broadcaster) = &self.broadcaster {
            let data = serde_json::json!({
                "job_id": self.job_id.as_str(),
                "stage": ctx.stage,
                "code": ctx.code.to_string(),
                "error": ctx.message,
                "retryable": ctx.retryable,
                "recoverable": ctx.recoverable,
            });
            broadcaster
                .publish(BroadcastEvent { kind: "error".to_string(), timestamp: Utc::now(), data })
                .await;
        }
    }

    /// Observational only — no persistence, no broadcast.
    pub async fn emit_info(&self, _message: &str) {}

    /// No-op; the worker owns terminal transitions.
    pub async fn emit_complete(&self, _summary: &str) {}

    /// Optional passthrough for streaming sub-events.
    #[allow(clippy::too_many_arguments)]
    pub async fn broadcast_stream(
        &self,
        task_id: &str,
        content: &str,
        done: bool,
        err: Option<&str>,
        model: Option<&str>,
        stage: Option<&str>,
    ) {
        let Some(broadcaster) = &self.broadcaster else { return };
        let data = serde_json::json!({
            "job_id": self.job_id.as_str(),
            "task_id": task_id,
            "content": content,
            "done": done,
            "error": err,
            "model": model,
            "stage": stage,
        });
        broadcaster
            .publish(BroadcastEvent { kind: "stream".to_string(), timestamp: Utc::now(), data })
            .await;
    }
}

#[cfg(test)]
#[path = "emitter_tests.rs"]
mod tests;
