// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Counting semaphore with the crate's error taxonomy applied.

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::platform::PlatformSemaphore;

/// A process-local counting semaphore.
///
/// Waits report a timeout as `Ok(false)`; an interrupted wait is
/// `Error::Interrupted`, an invalid deadline `Error::InvalidArg`, and any
/// other failure `Error::Internal`.
pub struct Semaphore {
    inner: PlatformSemaphore,
}

impl Semaphore {
    pub fn new(count: u32) -> Result<Self> {
        let inner = PlatformSemaphore::new(count)
            .map_err(|e| Error::internal(format!("unable to create semaphore: {e}")))?;
        Ok(Self { inner })
    }

    /// Increment the count.
    pub fn post(&self) -> Result<()> {
        self.inner
            .post()
            .map_err(|e| Error::internal(format!("unable to post semaphore: {e}")))
    }

    /// Decrement, blocking until the count is positive or the realtime
    /// `deadline` passes (`None` blocks indefinitely).
    pub fn wait(&self, deadline: Option<SystemTime>) -> Result<bool> {
        if let Some(dl) = deadline {
            if dl < UNIX_EPOCH {
                return Err(Error::invalid_arg("deadline precedes the epoch"));
            }
        }
        self.inner.wait(deadline).map_err(classify)
    }

    /// Decrement without blocking.
    pub fn try_wait(&self) -> Result<bool> {
        self.inner.try_wait().map_err(classify)
    }

    /// Current count.
    pub fn value(&self) -> usize {
        self.inner.value().map(|v| v as usize).unwrap_or(0)
    }
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore").field("value", &self.value()).finish()
    }
}

fn classify(e: io::Error) -> Error {
    #[cfg(unix)]
    match e.raw_os_error() {
        Some(libc::EINVAL) => return Error::invalid_arg("invalid timeout"),
        Some(libc::EINTR) => return Error::Interrupted("semaphore wait interrupted by signal".into()),
        _ => {}
    }
    if e.kind() == io::ErrorKind::Interrupted {
        return Error::Interrupted("semaphore wait interrupted".into());
    }
    Error::internal(format!("semaphore wait failed: {e}"))
}
