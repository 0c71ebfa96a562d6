// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Protocol modules and whole-stack operations.
//
// Links point both ways but own in one direction only: a module holds its
// upstream port strongly (lifetime flows from the transport up to the
// application) and its downstream module weakly. Both links are set once.

use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use crate::buf_chain::BufChain;
use crate::error::{Error, Result};
use crate::port::{PortRef, ProtoPort};

/// Shared handle to a protocol module.
pub type ModRef = Arc<dyn ProtoMod>;

/// A named, stackable unit that is also a port.
pub trait ProtoMod: ProtoPort {
    fn name(&self) -> &str;

    /// Bind this module on top of `upstream`. Called by the upstream side's
    /// `add_at_port`; a second call is a configuration error.
    fn attach(&self, upstream: PortRef) -> Result<()>;

    /// Stack `downstream` on this module's port, linking both directions.
    /// Fails without touching either module if this port already has a
    /// downstream or `downstream` is already attached elsewhere.
    fn add_at_port(&self, downstream: ModRef) -> Result<()>;

    fn upstream_mod(&self) -> Option<ModRef> {
        self.upstream_port().and_then(|p| p.proto_mod())
    }

    fn downstream_mod(&self) -> Option<ModRef>;

    /// Deliver a chain out of this module's downstream side: into its own
    /// output queue, or else straight to the downstream module.
    fn push_down(&self, chain: BufChain) -> Result<bool>;

    /// This module as a port handle.
    fn as_port(&self) -> Result<PortRef>;

    /// A fresh, unattached module equivalent to this one.
    fn clone_mod(&self) -> Result<ModRef>;

    /// Start background workers this module owns.
    fn mod_startup(&self) -> Result<()>;

    /// Stop and join background workers this module owns.
    fn mod_shutdown(&self) -> Result<()>;

    /// Human-readable description; unversioned.
    fn dump_info(&self, w: &mut dyn Write) -> std::io::Result<()>;

    /// Independent copy of the whole stack from the bottom module up to and
    /// including this one. Upstream modules are cloned first so the copy is
    /// re-linked bottom-up. Each module's `clone_mod` decides whether the
    /// copy shares underlying resources.
    fn clone_stack(&self) -> Result<ModRef> {
        let mut top = match self.upstream_mod() {
            Some(up) => Some(up.clone_stack()?),
            None => None,
        };
        push_mod(&mut top, self.clone_mod()?)
    }
}

/// Put `module`, which must not be part of any stack, on top of `*top` and
/// make it the new top. With `*top == None` the module becomes a bottom.
pub fn push_mod(top: &mut Option<ModRef>, module: ModRef) -> Result<ModRef> {
    if module.upstream_port().is_some() {
        return Err(Error::config(format!(
            "{}: pushee already attached",
            module.name()
        )));
    }
    if let Some(t) = top.as_ref() {
        t.add_at_port(Arc::clone(&module))?;
        debug!(module = module.name(), upstream = t.name(), "module pushed");
    }
    *top = Some(Arc::clone(&module));
    Ok(module)
}

/// Modules of the stack under (and including) `top`, bottom first.
pub fn stack_of(top: &ModRef) -> Vec<ModRef> {
    let mut mods = vec![Arc::clone(top)];
    while let Some(up) = mods.last().and_then(|m| m.upstream_mod()) {
        mods.push(up);
    }
    mods.reverse();
    mods
}

/// Start every module of the stack, bottom first.
pub fn startup_stack(top: &ModRef) -> Result<()> {
    for m in stack_of(top) {
        m.mod_startup()?;
    }
    Ok(())
}

/// Shut every module of the stack down, top first. All modules are visited;
/// the first error is returned.
pub fn shutdown_stack(top: &ModRef) -> Result<()> {
    let mut first = None;
    for m in stack_of(top).into_iter().rev() {
        if let Err(e) = m.mod_shutdown() {
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

/// Describe the stack, top first.
pub fn dump_stack(top: &ModRef, w: &mut dyn Write) -> std::io::Result<()> {
    for (depth, m) in stack_of(top).into_iter().rev().enumerate() {
        write!(w, "{:indent$}", "", indent = depth * 2)?;
        m.dump_info(w)?;
    }
    Ok(())
}
