// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-process table of live stacks, searchable by match parameters.
//
// Stacks are keyed by slab slot. `find` walks slots in ascending key order,
// so among several full matches the one in the lowest slot wins; keys of
// unregistered stacks are reused.

use std::sync::{Mutex, MutexGuard, PoisonError};

use slab::Slab;
use tracing::debug;

use crate::error::Result;
use crate::match_params::ProtoPortMatchParams;
use crate::proto_mod::ModRef;

/// Handle to a registered stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackKey(usize);

impl StackKey {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Default)]
pub struct StackRegistry {
    stacks: Mutex<Slab<ModRef>>,
}

impl StackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn stacks(&self) -> MutexGuard<'_, Slab<ModRef>> {
        self.stacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the stack whose top module is `top`.
    pub fn register(&self, top: ModRef) -> StackKey {
        let name = top.name().to_owned();
        let key = StackKey(self.stacks().insert(top));
        debug!(stack = %name, key = key.0, "stack registered");
        key
    }

    pub fn unregister(&self, key: StackKey) -> Option<ModRef> {
        let mut stacks = self.stacks();
        if !stacks.contains(key.0) {
            return None;
        }
        let top = stacks.remove(key.0);
        debug!(stack = top.name(), key = key.0, "stack unregistered");
        Some(top)
    }

    pub fn get(&self, key: StackKey) -> Option<ModRef> {
        self.stacks().get(key.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.stacks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks().is_empty()
    }

    fn snapshot(&self) -> Vec<(StackKey, ModRef)> {
        self.stacks()
            .iter()
            .map(|(k, m)| (StackKey(k), ModRef::clone(m)))
            .collect()
    }

    /// First registered stack that satisfies every constraint in `params`.
    /// On return `params` holds the results of the last stack scored.
    pub fn find(&self, params: &mut ProtoPortMatchParams) -> Result<Option<(StackKey, ModRef)>> {
        for (key, top) in self.snapshot() {
            if params.is_full_match(&top.as_port()?) {
                return Ok(Some((key, top)));
            }
        }
        Ok(None)
    }

    /// Every registered stack that satisfies `params`, in key order.
    pub fn find_all(&self, params: &mut ProtoPortMatchParams) -> Result<Vec<(StackKey, ModRef)>> {
        let mut found = Vec::new();
        for (key, top) in self.snapshot() {
            if params.is_full_match(&top.as_port()?) {
                found.push((key, top));
            }
        }
        Ok(found)
    }
}

impl std::fmt::Debug for StackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .stacks()
            .iter()
            .map(|(k, m)| format!("{k}:{}", m.name()))
            .collect();
        f.debug_struct("StackRegistry").field("stacks", &names).finish()
    }
}
