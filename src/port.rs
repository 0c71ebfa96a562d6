// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The port contract every stack layer and every physical transport honors.

use std::sync::Arc;

use crate::buf_chain::BufChain;
use crate::error::{Error, Result};
use crate::match_params::ProtoPortMatchParams;
use crate::proto_mod::ModRef;
use crate::timeout::Timeout;

/// Shared handle to a port.
pub type PortRef = Arc<dyn ProtoPort>;

/// A bidirectional conduit for buffer chains.
///
/// `pop` returns `Ok(None)` when the timeout elapsed and an error when the
/// stack is broken, so callers can always tell "no data yet" apart from
/// failure.
pub trait ProtoPort: Send + Sync {
    /// Receive one chain, blocking as `timeout` allows.
    fn pop(&self, timeout: &Timeout) -> Result<Option<BufChain>>;

    /// Receive one chain without blocking.
    fn try_pop(&self) -> Result<Option<BufChain>>;

    /// Send one chain toward the transport. `Ok(false)` means it was not
    /// accepted (full queue, offline port) and has been dropped.
    fn push(&self, chain: BufChain, timeout: &Timeout) -> Result<bool>;

    /// Send one chain without blocking.
    fn try_push(&self, chain: BufChain) -> Result<bool>;

    /// The module this port belongs to, if any.
    fn proto_mod(&self) -> Option<ModRef>;

    /// The port this one is stacked on, if any.
    fn upstream_port(&self) -> Option<PortRef>;

    fn must_get_upstream_port(&self) -> Result<PortRef> {
        self.upstream_port()
            .ok_or_else(|| Error::config("port has no upstream"))
    }

    /// Whether traffic through this port is currently suppressed.
    fn is_offline(&self) -> bool;

    fn set_offline(&self, offline: bool);

    /// Score this port alone contributes to `params`.
    fn own_match(&self, _params: &mut ProtoPortMatchParams) -> usize {
        0
    }

    /// Score of this port plus every port below it.
    fn match_params(&self, params: &mut ProtoPortMatchParams) -> usize {
        let mut n = self.own_match(params);
        if let Some(up) = self.upstream_port() {
            n += up.match_params(params);
        }
        n
    }
}
