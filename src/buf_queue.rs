// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bounded blocking queue of buffer chains.
//
// Enqueue is a lock-free bounded push into a fixed ring; dequeue blocks on a
// counting semaphore whose count always equals the number of chains in the
// ring. A push is posted only after the chain is in the ring, and a pop
// removes a chain only after taking a count, so a successful wait is always
// backed by an item.

use std::time::{Duration, SystemTime};

use crossbeam_queue::ArrayQueue;
use tracing::{debug, trace};

use crate::buf_chain::BufChain;
use crate::error::{Error, Result};
use crate::semaphore::Semaphore;
use crate::timeout::Timeout;

/// Delay before the single retry of a push into a full queue.
pub const DEFAULT_PUSH_RETRY_INTERVAL: Duration = Duration::from_nanos(1_000);

pub struct BufQueue {
    ring: ArrayQueue<BufChain>,
    rd_sem: Semaphore,
    retry_interval: Duration,
}

impl BufQueue {
    /// Create a queue holding at most `capacity` chains.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_retry_interval(capacity, DEFAULT_PUSH_RETRY_INTERVAL)
    }

    /// Create a queue whose full-queue retry waits `retry_interval`.
    pub fn with_retry_interval(capacity: usize, retry_interval: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid_arg("queue capacity must be non-zero"));
        }
        Ok(Self {
            ring: ArrayQueue::new(capacity),
            rd_sem: Semaphore::new(0)?,
            retry_interval,
        })
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Take the chain out of `owner` and enqueue it.
    ///
    /// If the ring is full the calling thread sleeps for the retry interval
    /// and tries once more. When that fails too, the chain is put back into
    /// `owner` untouched and `Ok(false)` is returned; the producer decides
    /// whether to drop or retry.
    pub fn push(&self, owner: &mut Option<BufChain>) -> Result<bool> {
        let chain = owner
            .take()
            .ok_or_else(|| Error::invalid_arg("push of an empty ownership slot"))?;
        let chain = match self.ring.push(chain) {
            Ok(()) => return self.posted(),
            Err(chain) => chain,
        };
        trace!(capacity = self.capacity(), "queue full, retrying push once");
        std::thread::sleep(self.retry_interval);
        match self.ring.push(chain) {
            Ok(()) => self.posted(),
            Err(chain) => {
                trace!(capacity = self.capacity(), "queue still full, push rejected");
                *owner = Some(chain);
                Ok(false)
            }
        }
    }

    fn posted(&self) -> Result<bool> {
        // The chain is already in the ring; failing here cannot be undone.
        self.rd_sem
            .post()
            .map_err(|e| Error::internal(format!("FATAL: chain enqueued but not signalled: {e}")))?;
        Ok(true)
    }

    /// Dequeue the oldest chain.
    ///
    /// `Indefinite` blocks, `Poll` never blocks, `At` waits until the
    /// deadline and `After` is first converted against this queue's clock.
    /// Returns `Ok(None)` only when the timeout elapsed.
    pub fn pop(&self, timeout: &Timeout) -> Result<Option<BufChain>> {
        match self.abs_timeout(timeout)? {
            Timeout::Indefinite => self.pop_inner(true, None),
            Timeout::Poll => self.pop_inner(false, None),
            Timeout::At(dl) => self.pop_inner(true, Some(dl)),
            Timeout::After(_) => Err(Error::internal("relative timeout survived conversion")),
        }
    }

    /// Dequeue without blocking.
    pub fn try_pop(&self) -> Result<Option<BufChain>> {
        self.pop_inner(false, None)
    }

    /// Convert a relative timeout to an absolute one on the clock the read
    /// semaphore waits against. Other variants pass through unchanged.
    pub fn abs_timeout(&self, timeout: &Timeout) -> Result<Timeout> {
        match *timeout {
            Timeout::After(d) => SystemTime::now()
                .checked_add(d)
                .map(Timeout::At)
                .ok_or_else(|| Error::invalid_arg(format!("timeout {d:?} overflows the clock"))),
            other => Ok(other),
        }
    }

    fn pop_inner(&self, wait: bool, deadline: Option<SystemTime>) -> Result<Option<BufChain>> {
        let got = if wait {
            self.rd_sem.wait(deadline)?
        } else {
            self.rd_sem.try_wait()?
        };
        if !got {
            return Ok(None);
        }
        match self.ring.pop() {
            Some(chain) => Ok(Some(chain)),
            None => Err(Error::internal(
                "FATAL: semaphore decremented but no chain in the queue",
            )),
        }
    }
}

impl Drop for BufQueue {
    fn drop(&mut self) {
        let mut n = 0usize;
        while self.ring.pop().is_some() {
            n += 1;
        }
        if n > 0 {
            debug!(released = n, "queue dropped with chains still enqueued");
        }
    }
}

impl std::fmt::Debug for BufQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
