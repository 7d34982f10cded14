// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ix_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by [`crate::Queue`] operations. All methods surface
/// store errors unchanged; this exists only to name the boundary.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
