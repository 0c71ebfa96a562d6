// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ordered chain of buffers carrying one unit of transport payload.
//
// A `BufChain` is deliberately not `Clone`: whoever holds it owns it, and
// handing it to a queue or a module moves it. Where a callee may have to
// give it back (a full queue), the hand-over goes through an
// `Option<BufChain>` slot that is emptied on success and refilled on
// failure.

use std::collections::VecDeque;

use crate::buffer::{Buf, BufPool};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct BufChain {
    bufs: VecDeque<Buf>,
}

impl BufChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_buf(buf: Buf) -> Self {
        let mut c = Self::new();
        c.bufs.push_back(buf);
        c
    }

    /// Chain holding a copy of `src`, in global-pool buffers of default capacity.
    pub fn from_slice(src: &[u8]) -> Self {
        let mut c = Self::new();
        c.append(BufPool::global(), src);
        c
    }

    /// Number of buffers.
    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    /// Total payload bytes across all buffers.
    pub fn size(&self) -> usize {
        self.bufs.iter().map(Buf::size).sum()
    }

    pub fn head(&self) -> Option<&Buf> {
        self.bufs.front()
    }

    pub fn tail(&self) -> Option<&Buf> {
        self.bufs.back()
    }

    pub fn get(&self, idx: usize) -> Option<&Buf> {
        self.bufs.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Buf> {
        self.bufs.get_mut(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buf> {
        self.bufs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Buf> {
        self.bufs.iter_mut()
    }

    pub fn add_at_head(&mut self, buf: Buf) {
        self.bufs.push_front(buf);
    }

    pub fn add_at_tail(&mut self, buf: Buf) {
        self.bufs.push_back(buf);
    }

    /// Allocate a buffer from `pool` and link it at the head.
    pub fn create_at_head(&mut self, pool: &BufPool, capacity: usize) -> &mut Buf {
        self.bufs.push_front(pool.get_with_capacity(capacity));
        &mut self.bufs[0]
    }

    /// Allocate a buffer from `pool` and link it at the tail.
    pub fn create_at_tail(&mut self, pool: &BufPool, capacity: usize) -> &mut Buf {
        self.bufs.push_back(pool.get_with_capacity(capacity));
        let last = self.bufs.len() - 1;
        &mut self.bufs[last]
    }

    fn check_index(&self, idx: usize) -> Result<()> {
        if idx >= self.bufs.len() {
            return Err(Error::invalid_arg(format!(
                "buffer index {idx} out of range (chain holds {})",
                self.bufs.len()
            )));
        }
        Ok(())
    }

    /// Link `buf` right after the buffer at `idx`.
    pub fn after(&mut self, idx: usize, buf: Buf) -> Result<()> {
        self.check_index(idx)?;
        self.bufs.insert(idx + 1, buf);
        Ok(())
    }

    /// Link `buf` right before the buffer at `idx`.
    pub fn before(&mut self, idx: usize, buf: Buf) -> Result<()> {
        self.check_index(idx)?;
        self.bufs.insert(idx, buf);
        Ok(())
    }

    /// Remove the buffer at `idx` from the chain and return it.
    pub fn unlink(&mut self, idx: usize) -> Result<Buf> {
        self.check_index(idx)?;
        self.bufs
            .remove(idx)
            .ok_or_else(|| Error::internal("checked index vanished"))
    }

    /// Split into two independent chains: `self` keeps `[0, idx)` and the
    /// returned chain starts with the buffer at `idx`.
    pub fn split(&mut self, idx: usize) -> Result<BufChain> {
        self.check_index(idx)?;
        Ok(BufChain {
            bufs: self.bufs.split_off(idx),
        })
    }

    /// Move every buffer of `other` to the tail of this chain.
    pub fn join(&mut self, mut other: BufChain) {
        self.bufs.append(&mut other.bufs);
    }

    /// Copy `src` to the end of the payload, filling the tail buffer's spare
    /// room first and then allocating buffers of `pool`'s default capacity.
    pub fn append(&mut self, pool: &BufPool, src: &[u8]) {
        let mut rest = src;
        if let Some(last) = self.bufs.back_mut() {
            let n = last.tailroom().min(rest.len());
            if n > 0 {
                let old = last.size();
                last.fit_size(old + n);
                last.payload_mut()[old..].copy_from_slice(&rest[..n]);
                rest = &rest[n..];
            }
        }
        while !rest.is_empty() {
            let b = self.create_at_tail(pool, pool.default_capacity().max(1));
            let n = b.capacity().min(rest.len());
            b.fit_size(n);
            b.payload_mut().copy_from_slice(&rest[..n]);
            rest = &rest[n..];
        }
    }

    /// Copy payload bytes starting at logical offset `off` into `dst`.
    /// Returns the number of bytes copied.
    pub fn extract(&self, dst: &mut [u8], off: usize) -> usize {
        let mut skip = off;
        let mut done = 0;
        for b in &self.bufs {
            if done == dst.len() {
                break;
            }
            let p = b.payload();
            if skip >= p.len() {
                skip -= p.len();
                continue;
            }
            let n = (p.len() - skip).min(dst.len() - done);
            dst[done..done + n].copy_from_slice(&p[skip..skip + n]);
            done += n;
            skip = 0;
        }
        done
    }

    /// Gather the whole payload into one vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(self.size());
        for b in &self.bufs {
            v.extend_from_slice(b.payload());
        }
        v
    }
}

impl std::fmt::Debug for BufChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufChain")
            .field("bufs", &self.bufs.len())
            .field("size", &self.size())
            .finish()
    }
}

impl From<Buf> for BufChain {
    fn from(buf: Buf) -> Self {
        Self::from_buf(buf)
    }
}
