// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX implementation of the process-local counting semaphore.
// An unnamed `sem_t`; `sem_timedwait` measures its deadline against
// CLOCK_REALTIME, which is why absolute timeouts are `SystemTime`s.

use std::cell::UnsafeCell;
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// PlatformSemaphore: sem_t on the heap (it must never move once initialised)
// ---------------------------------------------------------------------------

pub struct PlatformSemaphore {
    sem: Box<UnsafeCell<libc::sem_t>>,
}

// Safety: sem_t operations are thread-safe by contract.
unsafe impl Send for PlatformSemaphore {}
unsafe impl Sync for PlatformSemaphore {}

impl PlatformSemaphore {
    /// Create a semaphore with an initial `count`.
    pub fn new(count: u32) -> io::Result<Self> {
        let sem: Box<UnsafeCell<libc::sem_t>> =
            Box::new(UnsafeCell::new(unsafe { std::mem::zeroed() }));
        if unsafe { libc::sem_init(sem.get(), 0, count as libc::c_uint) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { sem })
    }

    fn ptr(&self) -> *mut libc::sem_t {
        self.sem.get()
    }

    /// Increment the count, waking one waiter.
    pub fn post(&self) -> io::Result<()> {
        if unsafe { libc::sem_post(self.ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Decrement, blocking until the count is positive or `deadline` passes.
    /// Returns `Ok(false)` on timeout. `EINTR` and `EINVAL` are reported as
    /// errors for the caller to classify.
    pub fn wait(&self, deadline: Option<SystemTime>) -> io::Result<bool> {
        let rc = match deadline {
            None => unsafe { libc::sem_wait(self.ptr()) },
            Some(dl) => {
                let since = dl
                    .duration_since(UNIX_EPOCH)
                    .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
                let ts = libc::timespec {
                    tv_sec: since.as_secs() as libc::time_t,
                    tv_nsec: since.subsec_nanos() as libc::c_long,
                };
                unsafe { libc::sem_timedwait(self.ptr(), &ts) }
            }
        };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ETIMEDOUT) => Ok(false),
            _ => Err(err),
        }
    }

    /// Decrement without blocking. Returns `Ok(false)` if the count was zero.
    pub fn try_wait(&self) -> io::Result<bool> {
        if unsafe { libc::sem_trywait(self.ptr()) } == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN) => Ok(false),
            _ => Err(err),
        }
    }

    /// Current count.
    pub fn value(&self) -> io::Result<u32> {
        let mut v: libc::c_int = 0;
        if unsafe { libc::sem_getvalue(self.ptr(), &mut v) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(v.max(0) as u32)
    }
}

impl Drop for PlatformSemaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_destroy(self.ptr()) };
    }
}
