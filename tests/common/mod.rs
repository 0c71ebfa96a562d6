// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Protocols shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use protomod::{
    push_mod, BufChain, BufPool, ByteOrder, CoreConfig, Error, Loopback, ModRef, Module,
    PortRef, Protocol, ProtoPortMatchParams, Result,
};

pub const HEADER_LEN: usize = 2;

/// Prepends a u16 length header on output, checks and strips it on input.
pub struct Framing {
    pub order: ByteOrder,
    pub pool: BufPool,
}

impl Framing {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            pool: BufPool::new("framing", 64),
        }
    }
}

impl Protocol for Framing {
    fn name(&self) -> &str {
        "framing"
    }

    fn process_output(&self, mut chain: BufChain) -> Result<BufChain> {
        let len = u16::try_from(chain.size())
            .map_err(|_| Error::InvalidArg("frame too long".into()))?;
        let hdr = chain.create_at_head(&self.pool, HEADER_LEN);
        hdr.payload_mut().copy_from_slice(&self.order.u16_bytes(len));
        Ok(chain)
    }

    fn process_input(&self, mut chain: BufChain) -> Result<BufChain> {
        let mut hdr = [0u8; HEADER_LEN];
        if chain.extract(&mut hdr, 0) != HEADER_LEN {
            return Err(Error::InvalidArg("runt frame".into()));
        }
        if usize::from(self.order.read_u16(hdr)) != chain.size() - HEADER_LEN {
            return Err(Error::InvalidArg("length mismatch".into()));
        }
        let mut strip = HEADER_LEN;
        while strip > 0 {
            let Some(head) = chain.get_mut(0) else { break };
            if head.size() > strip {
                let off = head.offset() + strip;
                head.set_payload_offset(off)?;
                strip = 0;
            } else {
                strip -= head.size();
                chain.unlink(0)?;
            }
        }
        Ok(chain)
    }

    fn clone_protocol(&self) -> Result<Self> {
        Ok(Framing {
            order: self.order,
            pool: self.pool.clone(),
        })
    }
}

/// Identity transform with a configurable name.
pub struct Pass(pub &'static str);

impl Protocol for Pass {
    fn name(&self) -> &str {
        self.0
    }

    fn process_input(&self, chain: BufChain) -> Result<BufChain> {
        Ok(chain)
    }

    fn process_output(&self, chain: BufChain) -> Result<BufChain> {
        Ok(chain)
    }

    fn clone_protocol(&self) -> Result<Self> {
        Ok(Pass(self.0))
    }
}

/// A module that implements neither transform nor clone.
pub struct Bare;

impl Protocol for Bare {
    fn name(&self) -> &str {
        "bare"
    }
}

/// Which match parameter a `Feature` module claims.
#[derive(Clone, Copy, Debug)]
pub enum Feature {
    Rssi,
    Depack,
    SrpVersion(u64),
    Tdest(u64),
}

impl Protocol for Feature {
    fn name(&self) -> &str {
        match self {
            Feature::Rssi => "rssi",
            Feature::Depack => "depack",
            Feature::SrpVersion(_) => "srp",
            Feature::Tdest(_) => "tdest",
        }
    }

    fn process_input(&self, chain: BufChain) -> Result<BufChain> {
        Ok(chain)
    }

    fn process_output(&self, chain: BufChain) -> Result<BufChain> {
        Ok(chain)
    }

    fn match_params(&self, params: &mut ProtoPortMatchParams, me: &PortRef) -> usize {
        match *self {
            Feature::Rssi => params.have_rssi.claim(None, me),
            Feature::Depack => params.have_depack.claim(None, me),
            Feature::SrpVersion(v) => params.srp_version.claim(Some(v), me),
            Feature::Tdest(t) => params.tdest.claim(Some(t), me),
        }
    }

    fn clone_protocol(&self) -> Result<Self> {
        Ok(*self)
    }
}

pub fn loopback(depth: usize) -> Arc<Module<Loopback>> {
    Loopback::new()
        .module(depth, CoreConfig::default())
        .expect("loopback")
}

/// Build a stack from bottom to top; returns the top module.
pub fn stack(mods: Vec<ModRef>) -> ModRef {
    let mut top = None;
    for m in mods {
        push_mod(&mut top, m).expect("push_mod");
    }
    top.expect("empty stack")
}
