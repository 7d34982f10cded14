// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name→handler mapping. Registration is expected to happen entirely
//! before workers start; reads afterward are unbounded and concurrent.

use std::collections::HashMap;
use std::sync::Arc;

use ix_core::JobError;
use parking_lot::RwLock;

use crate::handler::Handler;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own name. A duplicate name is a
    /// programmer error — treat it as fatal at the call site.
    pub fn register(&self, handler: Arc<dyn Handler>) -> Result<(), JobError> {
        let name = handler.name().to_string();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&name) {
            return Err(JobError::DuplicateHandler(name));
        }
        handlers.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
