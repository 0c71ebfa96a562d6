// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Generic protocol module: a `PortCore` (queue, links, offline flag, relay
// worker) composed with a `Protocol` that supplies per-module behavior.
//
// A module with an output queue (depth > 0) is drained by `pop`; when it is
// also stacked on an upstream, `mod_startup` runs a relay worker that pulls
// from the upstream, applies `process_input` and fills the queue. A module
// without a queue is a synchronous bypass: `pop` pulls from the upstream and
// transforms on the caller's thread. `push` always transforms with
// `process_output` and forwards to the upstream.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, error, trace, warn};

use crate::buf_chain::BufChain;
use crate::buf_queue::BufQueue;
use crate::config::{ByteOrder, CoreConfig};
use crate::error::{Error, Result};
use crate::match_params::ProtoPortMatchParams;
use crate::port::{PortRef, ProtoPort};
use crate::proto_mod::{ModRef, ProtoMod};
use crate::timeout::Timeout;
use crate::worker::Worker;

// ---------------------------------------------------------------------------
// PortCore
// ---------------------------------------------------------------------------

/// Port state shared by every module, handed to `Protocol` hooks.
pub struct PortCore {
    depth: usize,
    queue: Option<Arc<BufQueue>>,
    offline: AtomicBool,
    upstream: OnceLock<PortRef>,
    downstream: Mutex<Option<Weak<dyn ProtoMod>>>,
    me_port: Weak<dyn ProtoPort>,
    me_mod: Weak<dyn ProtoMod>,
    config: CoreConfig,
    worker: Mutex<Option<Worker>>,
}

impl PortCore {
    /// Private output queue; `None` for a bypass port.
    pub fn queue(&self) -> Option<&BufQueue> {
        self.queue.as_deref()
    }

    /// Configured output-queue depth (0 = bypass).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn upstream_port(&self) -> Option<PortRef> {
        self.upstream.get().cloned()
    }

    pub fn must_get_upstream_port(&self) -> Result<PortRef> {
        self.upstream_port()
            .ok_or_else(|| Error::config("must_get_upstream_port(): no upstream attached"))
    }

    pub fn downstream_mod(&self) -> Option<ModRef> {
        self.downstream_slot().as_ref().and_then(Weak::upgrade)
    }

    fn downstream_slot(&self) -> MutexGuard<'_, Option<Weak<dyn ProtoMod>>> {
        self.downstream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Convert `timeout` against the clock of this port's output queue.
    pub fn abs_timeout(&self, timeout: &Timeout) -> Result<Timeout> {
        match &self.queue {
            Some(q) => q.abs_timeout(timeout),
            None => Err(Error::config(
                "cannot compute an absolute timeout without an output queue",
            )),
        }
    }

    /// Deliver a chain out of the downstream side: into the output queue if
    /// there is one, else to the downstream module. A chain the full queue
    /// refused is dropped and `Ok(false)` returned.
    pub fn push_downstream(&self, chain: BufChain) -> Result<bool> {
        if let Some(q) = &self.queue {
            let mut slot = Some(chain);
            let queued = q.push(&mut slot)?;
            if !queued {
                trace!("output queue full, chain dropped");
            }
            return Ok(queued);
        }
        match self.downstream_mod() {
            Some(d) => d.push_down(chain),
            None => Err(Error::config("no output queue and no downstream module")),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.config.byte_order
    }

    /// This module as a port handle.
    pub fn self_port(&self) -> Option<PortRef> {
        self.me_port.upgrade()
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Behavior of one kind of module.
///
/// The defaults implement the standard port semantics; a transform module
/// overrides `process_input`/`process_output`, a transport at the bottom of
/// a stack overrides `push`/`pop` to perform its I/O.
pub trait Protocol: Send + Sync + Sized + 'static {
    fn name(&self) -> &str;

    /// Transform a chain travelling up toward the application.
    fn process_input(&self, _chain: BufChain) -> Result<BufChain> {
        Err(Error::config(format!(
            "{}: process_input() not implemented",
            self.name()
        )))
    }

    /// Transform a chain travelling down toward the transport.
    fn process_output(&self, _chain: BufChain) -> Result<BufChain> {
        Err(Error::config(format!(
            "{}: process_output() not implemented",
            self.name()
        )))
    }

    fn pop(&self, core: &PortCore, timeout: &Timeout) -> Result<Option<BufChain>> {
        match core.queue() {
            Some(q) => q.pop(timeout),
            None => match core.must_get_upstream_port()?.pop(timeout)? {
                Some(chain) => self.process_input(chain).map(Some),
                None => Ok(None),
            },
        }
    }

    fn try_pop(&self, core: &PortCore) -> Result<Option<BufChain>> {
        match core.queue() {
            Some(q) => q.try_pop(),
            None => match core.must_get_upstream_port()?.try_pop()? {
                Some(chain) => self.process_input(chain).map(Some),
                None => Ok(None),
            },
        }
    }

    fn push(&self, core: &PortCore, chain: BufChain, timeout: &Timeout) -> Result<bool> {
        let up = core.must_get_upstream_port()?;
        up.push(self.process_output(chain)?, timeout)
    }

    fn try_push(&self, core: &PortCore, chain: BufChain) -> Result<bool> {
        let up = core.must_get_upstream_port()?;
        up.try_push(self.process_output(chain)?)
    }

    /// Claim the parameters this module implements; `me` is this module's
    /// port, recorded as the one that satisfied a constraint.
    fn match_params(&self, _params: &mut ProtoPortMatchParams, _me: &PortRef) -> usize {
        0
    }

    /// Behavior for a clone of this module. Whether the clone shares
    /// underlying resources (e.g. an OS connection) is this method's call.
    fn clone_protocol(&self) -> Result<Self> {
        Err(Error::internal(format!(
            "{}: clone not implemented",
            self.name()
        )))
    }

    fn startup(&self, _core: &PortCore) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self, _core: &PortCore) -> Result<()> {
        Ok(())
    }

    fn dump_info(&self, _w: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Module<P>
// ---------------------------------------------------------------------------

pub struct Module<P: Protocol> {
    core: PortCore,
    proto: Arc<P>,
}

impl<P: Protocol> Module<P> {
    /// Create a detached module with an output queue of `depth` chains
    /// (0 for a bypass port) and default tunables.
    pub fn new(proto: P, depth: usize) -> Result<Arc<Self>> {
        Self::with_config(proto, depth, CoreConfig::default())
    }

    pub fn with_config(proto: P, depth: usize, config: CoreConfig) -> Result<Arc<Self>> {
        let queue = if depth > 0 {
            Some(Arc::new(BufQueue::with_retry_interval(
                depth,
                config.push_retry_interval(),
            )?))
        } else {
            None
        };
        Ok(Arc::new_cyclic(|me: &Weak<Self>| {
            let me_port: Weak<dyn ProtoPort> = me.clone();
            let me_mod: Weak<dyn ProtoMod> = me.clone();
            Module {
                core: PortCore {
                    depth,
                    queue,
                    offline: AtomicBool::new(false),
                    upstream: OnceLock::new(),
                    downstream: Mutex::new(None),
                    me_port,
                    me_mod,
                    config,
                    worker: Mutex::new(None),
                },
                proto: Arc::new(proto),
            }
        }))
    }

    pub fn protocol(&self) -> &P {
        &self.proto
    }

    pub fn core(&self) -> &PortCore {
        &self.core
    }

    /// Whether a relay worker is currently running.
    pub fn has_worker(&self) -> bool {
        self.core.worker_slot().as_ref().is_some_and(Worker::is_running)
    }
}

impl<P: Protocol> ProtoPort for Module<P> {
    fn pop(&self, timeout: &Timeout) -> Result<Option<BufChain>> {
        self.proto.pop(&self.core, timeout)
    }

    fn try_pop(&self) -> Result<Option<BufChain>> {
        self.proto.try_pop(&self.core)
    }

    fn push(&self, chain: BufChain, timeout: &Timeout) -> Result<bool> {
        self.proto.push(&self.core, chain, timeout)
    }

    fn try_push(&self, chain: BufChain) -> Result<bool> {
        self.proto.try_push(&self.core, chain)
    }

    fn proto_mod(&self) -> Option<ModRef> {
        self.core.me_mod.upgrade()
    }

    fn upstream_port(&self) -> Option<PortRef> {
        self.core.upstream_port()
    }

    fn must_get_upstream_port(&self) -> Result<PortRef> {
        self.core.must_get_upstream_port()
    }

    fn is_offline(&self) -> bool {
        self.core.is_offline()
    }

    fn set_offline(&self, offline: bool) {
        self.core.set_offline(offline);
    }

    fn own_match(&self, params: &mut ProtoPortMatchParams) -> usize {
        match self.core.self_port() {
            Some(me) => self.proto.match_params(params, &me),
            None => 0,
        }
    }
}

impl<P: Protocol> ProtoMod for Module<P> {
    fn name(&self) -> &str {
        self.proto.name()
    }

    fn attach(&self, upstream: PortRef) -> Result<()> {
        self.core.upstream.set(upstream).map_err(|_| {
            Error::config(format!("{}: already have an upstream module", self.name()))
        })?;
        debug!(module = self.name(), "attached to upstream");
        Ok(())
    }

    fn add_at_port(&self, downstream: ModRef) -> Result<()> {
        let mut slot = self.core.downstream_slot();
        if slot.as_ref().is_some_and(|w| w.strong_count() > 0) {
            return Err(Error::config(format!(
                "{}: already have a downstream module",
                self.name()
            )));
        }
        // The new downstream must not already be this module or below it.
        let below = Arc::as_ptr(&downstream).cast::<()>();
        let mut at = Some(self.as_port()?);
        while let Some(port) = at {
            if Arc::as_ptr(&port).cast::<()>() == below {
                return Err(Error::config(format!(
                    "{}: {} is already part of this stack",
                    self.name(),
                    downstream.name()
                )));
            }
            at = port.upstream_port();
        }
        downstream.attach(self.as_port()?)?;
        *slot = Some(Arc::downgrade(&downstream));
        Ok(())
    }

    fn downstream_mod(&self) -> Option<ModRef> {
        self.core.downstream_mod()
    }

    fn push_down(&self, chain: BufChain) -> Result<bool> {
        self.core.push_downstream(chain)
    }

    fn as_port(&self) -> Result<PortRef> {
        self.core
            .self_port()
            .ok_or_else(|| Error::internal(format!("{}: module is being dropped", self.name())))
    }

    fn clone_mod(&self) -> Result<ModRef> {
        let proto = self.proto.clone_protocol()?;
        let m = Module::with_config(proto, self.core.depth, self.core.config.clone())?;
        m.core.set_offline(self.core.is_offline());
        let m: ModRef = m;
        Ok(m)
    }

    fn mod_startup(&self) -> Result<()> {
        {
            let mut slot = self.core.worker_slot();
            if slot.is_none() {
                if let (Some(q), Some(up)) = (self.core.queue.clone(), self.core.upstream_port()) {
                    let poll = self.core.config.worker_poll_interval();
                    *slot = Some(spawn_relay(Arc::clone(&self.proto), up, q, poll)?);
                }
            }
        }
        self.proto.startup(&self.core)?;
        debug!(module = self.name(), "module started");
        Ok(())
    }

    fn mod_shutdown(&self) -> Result<()> {
        let hook = self.proto.shutdown(&self.core);
        let worker = self.core.worker_slot().take();
        if let Some(mut w) = worker {
            w.stop()?;
        }
        debug!(module = self.name(), "module shut down");
        hook
    }

    fn dump_info(&self, w: &mut dyn Write) -> io::Result<()> {
        let state = if self.core.is_offline() { "offline" } else { "online" };
        match self.core.queue() {
            Some(q) => writeln!(
                w,
                "{}: {state}, queue {}/{}",
                self.name(),
                q.len(),
                q.capacity()
            )?,
            None => writeln!(w, "{}: {state}, bypass", self.name())?,
        }
        self.proto.dump_info(w)
    }
}

impl<P: Protocol> std::fmt::Debug for Module<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.proto.name())
            .field("depth", &self.core.depth)
            .field("offline", &self.core.is_offline())
            .field("attached", &self.core.upstream.get().is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Relay worker
// ---------------------------------------------------------------------------

fn spawn_relay<P: Protocol>(
    proto: Arc<P>,
    upstream: PortRef,
    queue: Arc<BufQueue>,
    poll: Duration,
) -> Result<Worker> {
    let name = format!("{}-relay", proto.name());
    Worker::spawn(&name, move |stop| {
        let poll = Timeout::After(poll);
        while !stop.is_stopped() {
            let chain = match upstream.pop(&poll) {
                Ok(Some(c)) => c,
                Ok(None) => continue,
                Err(e) if e.is_retriable() => continue,
                Err(e) if is_fatal(&e) => {
                    error!(module = proto.name(), error = %e, "relay stopped: upstream pop failed");
                    return;
                }
                Err(e) => {
                    warn!(module = proto.name(), error = %e, "upstream chain dropped");
                    continue;
                }
            };
            let chain = match proto.process_input(chain) {
                Ok(c) => c,
                Err(e) if is_fatal(&e) => {
                    error!(module = proto.name(), error = %e, "relay stopped");
                    return;
                }
                Err(e) => {
                    warn!(module = proto.name(), error = %e, "input chain dropped");
                    continue;
                }
            };
            let mut slot = Some(chain);
            match queue.push(&mut slot) {
                Ok(true) => {}
                Ok(false) => trace!(module = proto.name(), "output queue full, chain dropped"),
                Err(e) => {
                    error!(module = proto.name(), error = %e, "relay stopped: enqueue failed");
                    return;
                }
            }
        }
    })
}

// A malformed chain costs only that chain; anything else ends the relay.
fn is_fatal(e: &Error) -> bool {
    !matches!(e, Error::InvalidArg(_) | Error::Interrupted(_))
}
