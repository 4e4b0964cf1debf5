//! Generation gate
//!
//! While an action is generating, further conversation actions are
//! rejected. The gate is owned by the engine and released by dropping the
//! guard, so every exit path of a dispatch clears it.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Which dispatches exclude each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationScope {
    /// One action at a time across all tools.
    #[default]
    Global,
    /// One action at a time per tool; different tools run concurrently.
    PerTool,
}

const GLOBAL_KEY: &str = "*";

#[derive(Debug, Default)]
pub struct GenerationGate {
    scope: GenerationScope,
    busy: Mutex<HashSet<String>>,
}

impl GenerationGate {
    pub fn new(scope: GenerationScope) -> Self {
        Self {
            scope,
            busy: Mutex::new(HashSet::new()),
        }
    }

    pub fn scope(&self) -> GenerationScope {
        self.scope
    }

    fn key<'a>(&self, tool_id: &'a str) -> &'a str {
        match self.scope {
            GenerationScope::Global => GLOBAL_KEY,
            GenerationScope::PerTool => tool_id,
        }
    }

    /// Claims the slot for `tool_id`, or `None` if it is taken.
    pub fn try_acquire(&self, tool_id: &str) -> Option<GenerationGuard<'_>> {
        let key = self.key(tool_id).to_string();
        let mut busy = self.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if !busy.insert(key.clone()) {
            return None;
        }
        Some(GenerationGuard { gate: self, key })
    }

    /// Whether anything is generating.
    pub fn is_busy(&self) -> bool {
        !self
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Whether a dispatch for `tool_id` would be rejected.
    pub fn is_busy_for(&self, tool_id: &str) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(self.key(tool_id))
    }
}

#[must_use = "the gate is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GenerationGuard<'a> {
    gate: &'a GenerationGate,
    key: String,
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        self.gate
            .busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
