// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type shared by the handler registry and executor.

use thiserror::Error;

/// Errors surfaced by handler registration and dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("handler already registered: {0}")]
    DuplicateHandler(String),

    #[error("no handler registered")]
    HandlerNotFound(String),

    #[error("handler_name is empty")]
    EmptyHandlerName,

    #[error("{0}")]
    Cancelled(String),

    /// Generic handler-reported failure, classified by
    /// [`crate::classify`] on the way to a retry decision or `FailJob`.
    #[error("{0}")]
    Failed(String),
}
