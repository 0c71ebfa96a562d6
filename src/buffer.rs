// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Fixed-capacity pooled buffers.
//
// A `Buf` owns a block of storage borrowed from a `BufPool` and exposes a
// movable payload window inside it. Dropping the `Buf` hands the storage
// back to the pool it came from. Only storage of the pool's default
// capacity is kept for the next request; other sizes are released on drop,
// so odd-sized requests never accumulate in the pool.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::config::CoreConfig;
use crate::error::{Error, Result};

/// Default buffer capacity: an Ethernet MTU minus Ethernet, IPv4 and UDP
/// headers.
pub const DEFAULT_CAPACITY: usize = 1500 - 14 - 20 - 8;

// ---------------------------------------------------------------------------
// BufPool
// ---------------------------------------------------------------------------

/// Snapshot of a pool's accounting. `allocated == free + in_use` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub allocated: usize,
    pub free: usize,
    pub in_use: usize,
}

struct PoolState {
    free: Vec<Box<[u8]>>,
    allocated: usize,
}

struct PoolShared {
    name: String,
    default_capacity: usize,
    state: Mutex<PoolState>,
}

impl PoolShared {
    fn state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, capacity: usize) -> Box<[u8]> {
        let mut st = self.state();
        if capacity == self.default_capacity {
            if let Some(data) = st.free.pop() {
                return data;
            }
        }
        st.allocated += 1;
        drop(st);
        vec![0u8; capacity].into_boxed_slice()
    }

    fn give_back(&self, data: Box<[u8]>) {
        let mut st = self.state();
        if data.len() == self.default_capacity {
            st.free.push(data);
        } else {
            st.allocated -= 1;
            drop(st);
            drop(data);
        }
    }
}

/// Handle to a buffer pool. Cloning the handle shares the pool.
#[derive(Clone)]
pub struct BufPool {
    inner: Arc<PoolShared>,
}

impl BufPool {
    /// Create an independent pool.
    pub fn new(name: &str, default_capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolShared {
                name: name.to_owned(),
                default_capacity,
                state: Mutex::new(PoolState {
                    free: Vec::new(),
                    allocated: 0,
                }),
            }),
        }
    }

    /// Create a pool whose default capacity comes from `cfg`.
    pub fn from_config(name: &str, cfg: &CoreConfig) -> Self {
        Self::new(name, cfg.buf_capacity)
    }

    /// The process-wide pool.
    pub fn global() -> &'static BufPool {
        static POOL: OnceLock<BufPool> = OnceLock::new();
        POOL.get_or_init(|| BufPool::new("global", DEFAULT_CAPACITY))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn default_capacity(&self) -> usize {
        self.inner.default_capacity
    }

    /// Hand out a buffer of the pool's default capacity.
    pub fn get(&self) -> Buf {
        self.get_with_capacity(self.inner.default_capacity)
    }

    /// Hand out a buffer of `capacity` bytes. Free storage is reused only
    /// when `capacity` is the default one.
    pub fn get_with_capacity(&self, capacity: usize) -> Buf {
        let data = self.inner.take(capacity);
        Buf {
            data: Some(data),
            offset: 0,
            size: capacity,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Consistent accounting snapshot.
    pub fn stats(&self) -> PoolStats {
        let st = self.inner.state();
        PoolStats {
            allocated: st.allocated,
            free: st.free.len(),
            in_use: st.allocated - st.free.len(),
        }
    }

    pub fn num_allocated(&self) -> usize {
        self.stats().allocated
    }

    pub fn num_free(&self) -> usize {
        self.stats().free
    }

    pub fn num_in_use(&self) -> usize {
        self.stats().in_use
    }

    /// Release all free storage back to the system. Returns how many blocks
    /// were released.
    pub fn trim(&self) -> usize {
        let mut st = self.inner.state();
        let released = st.free.len();
        st.free.clear();
        st.allocated -= released;
        released
    }

    /// Whether `buf` was handed out by this pool.
    pub fn owns(&self, buf: &Buf) -> bool {
        Arc::ptr_eq(&self.inner, &buf.pool)
    }
}

impl std::fmt::Debug for BufPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufPool")
            .field("name", &self.inner.name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Buffers of the global pool currently in use or parked for reuse.
pub fn num_bufs_alloced() -> usize {
    BufPool::global().num_allocated()
}

/// Buffers parked in the global pool's free lists.
pub fn num_bufs_free() -> usize {
    BufPool::global().num_free()
}

/// Buffers of the global pool currently held by someone.
pub fn num_bufs_in_use() -> usize {
    BufPool::global().num_in_use()
}

// ---------------------------------------------------------------------------
// Buf
// ---------------------------------------------------------------------------

/// A fixed-capacity buffer with a payload window `[offset, offset + size)`.
pub struct Buf {
    data: Option<Box<[u8]>>,
    offset: usize,
    size: usize,
    pool: Arc<PoolShared>,
}

impl Buf {
    /// Get a buffer of `capacity` bytes from the global pool.
    pub fn new(capacity: usize) -> Self {
        BufPool::global().get_with_capacity(capacity)
    }

    /// Get a buffer from the global pool holding a copy of `src`. Payloads
    /// that fit get a default-capacity buffer with tailroom to spare.
    pub fn from_slice(src: &[u8]) -> Self {
        let pool = BufPool::global();
        let mut b = if src.len() <= pool.default_capacity() {
            pool.get()
        } else {
            pool.get_with_capacity(src.len())
        };
        b.data_mut()[..src.len()].copy_from_slice(src);
        b.size = src.len();
        b
    }

    fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }

    pub fn capacity(&self) -> usize {
        self.data().len()
    }

    /// Payload length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Start of the payload window relative to the start of storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes between the end of the payload and the end of storage.
    pub fn tailroom(&self) -> usize {
        self.capacity() - self.offset - self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn payload(&self) -> &[u8] {
        let (o, s) = (self.offset, self.size);
        &self.data()[o..o + s]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let (o, s) = (self.offset, self.size);
        &mut self.data_mut()[o..o + s]
    }

    /// Set the payload length. The window must stay inside the storage.
    pub fn set_size(&mut self, size: usize) -> Result<()> {
        if self.offset + size > self.capacity() {
            return Err(Error::invalid_arg(format!(
                "payload size {size} at offset {} exceeds capacity {}",
                self.offset,
                self.capacity()
            )));
        }
        self.size = size;
        Ok(())
    }

    /// Set the payload length when the caller already knows the window fits.
    pub(crate) fn fit_size(&mut self, size: usize) {
        debug_assert!(self.offset + size <= self.capacity());
        self.size = size.min(self.capacity() - self.offset);
    }

    /// Move the start of the payload window, keeping its end where it is
    /// (shrinking to zero if the new start lies beyond it).
    pub fn set_payload_offset(&mut self, offset: usize) -> Result<()> {
        if offset > self.capacity() {
            return Err(Error::invalid_arg(format!(
                "payload offset {offset} exceeds capacity {}",
                self.capacity()
            )));
        }
        let end = self.offset + self.size;
        self.size = end.saturating_sub(offset);
        self.offset = offset;
        Ok(())
    }

    /// Move the payload start back to the start of storage, keeping the end.
    pub fn reset_payload(&mut self) {
        self.size += self.offset;
        self.offset = 0;
    }

    /// Payload covers the whole storage again.
    pub fn reinit(&mut self) {
        self.offset = 0;
        self.size = self.capacity();
    }

    /// Name of the pool this buffer returns to.
    pub fn pool_name(&self) -> &str {
        &self.pool.name
    }
}

impl Drop for Buf {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.give_back(data);
        }
    }
}

impl PartialEq for Buf {
    fn eq(&self, other: &Self) -> bool {
        self.payload() == other.payload()
    }
}

impl Eq for Buf {}

impl std::fmt::Debug for Buf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buf")
            .field("capacity", &self.capacity())
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}
