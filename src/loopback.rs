// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-process transport: whatever is pushed into the port comes back out of
// the same port. It is the bottom of a stack in tests and demos, standing in
// for an OS-level transport.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::trace;

use crate::buf_chain::BufChain;
use crate::config::CoreConfig;
use crate::error::{Error, Result};
use crate::match_params::ProtoPortMatchParams;
use crate::module::{Module, PortCore, Protocol};
use crate::port::PortRef;
use crate::timeout::Timeout;

/// Loopback transport protocol.
///
/// Pushes land in the module's own output queue, so the module needs a
/// non-zero depth. While the port is offline every push is dropped. A
/// loopback built with `with_dest_port` claims `udp_dest_port` during stack
/// matching, as a UDP transport bound to that port would.
#[derive(Debug, Clone)]
pub struct Loopback {
    name: String,
    dest_port: Option<u64>,
}

impl Loopback {
    pub fn new() -> Self {
        Self {
            name: "loopback".to_owned(),
            dest_port: None,
        }
    }

    pub fn with_dest_port(port: u64) -> Self {
        Self {
            name: format!("loopback:{port}"),
            dest_port: Some(port),
        }
    }

    pub fn dest_port(&self) -> Option<u64> {
        self.dest_port
    }

    /// Wrap this transport in a module whose queue holds `depth` chains.
    pub fn module(self, depth: usize, config: CoreConfig) -> Result<Arc<Module<Self>>> {
        if depth == 0 {
            return Err(Error::invalid_arg("loopback needs a non-zero queue depth"));
        }
        Module::with_config(self, depth, config)
    }

    fn deliver(&self, core: &PortCore, chain: BufChain) -> Result<bool> {
        if core.is_offline() {
            trace!(module = %self.name, size = chain.size(), "offline, chain dropped");
            return Ok(false);
        }
        core.push_downstream(chain)
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for Loopback {
    fn name(&self) -> &str {
        &self.name
    }

    fn push(&self, core: &PortCore, chain: BufChain, _timeout: &Timeout) -> Result<bool> {
        self.deliver(core, chain)
    }

    fn try_push(&self, core: &PortCore, chain: BufChain) -> Result<bool> {
        self.deliver(core, chain)
    }

    fn match_params(&self, params: &mut ProtoPortMatchParams, me: &PortRef) -> usize {
        match self.dest_port {
            Some(port) => params.udp_dest_port.claim(Some(port), me),
            None => 0,
        }
    }

    // Nothing is shared: a clone is a second, independent loop.
    fn clone_protocol(&self) -> Result<Self> {
        Ok(self.clone())
    }

    fn dump_info(&self, w: &mut dyn Write) -> io::Result<()> {
        if let Some(port) = self.dest_port {
            writeln!(w, "    dest port {port}")?;
        }
        Ok(())
    }
}
