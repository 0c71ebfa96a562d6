// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Counting semaphore emulated with a mutex-protected counter and a condition
// variable, for targets without unnamed POSIX semaphores (macOS, Windows).
// Deadlines are realtime-clock instants, like `sem_timedwait`.

use std::io;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

pub struct PlatformSemaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl PlatformSemaphore {
    pub fn new(count: u32) -> io::Result<Self> {
        Ok(Self {
            count: Mutex::new(count),
            cond: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn post(&self) -> io::Result<()> {
        let mut c = self.lock();
        *c = c
            .checked_add(1)
            .ok_or_else(|| io::Error::other("semaphore count overflow"))?;
        drop(c);
        self.cond.notify_one();
        Ok(())
    }

    pub fn wait(&self, deadline: Option<SystemTime>) -> io::Result<bool> {
        let mut c = self.lock();
        while *c == 0 {
            match deadline {
                None => {
                    c = self.cond.wait(c).unwrap_or_else(PoisonError::into_inner);
                }
                Some(dl) => {
                    let remaining = match dl.duration_since(SystemTime::now()) {
                        Ok(d) if !d.is_zero() => d,
                        _ => return Ok(false),
                    };
                    c = self
                        .cond
                        .wait_timeout(c, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        *c -= 1;
        Ok(true)
    }

    pub fn try_wait(&self) -> io::Result<bool> {
        let mut c = self.lock();
        if *c == 0 {
            return Ok(false);
        }
        *c -= 1;
        Ok(true)
    }

    pub fn value(&self) -> io::Result<u32> {
        Ok(*self.lock())
    }
}
