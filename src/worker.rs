// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Module-owned background threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::error::{Error, Result};

/// Cooperative stop signal handed to a worker body.
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// A named thread running until its `StopToken` fires.
///
/// The body must check the token at least once per blocking period (e.g.
/// by polling its upstream with a bounded timeout) so `stop` returns
/// promptly.
pub struct Worker {
    name: String,
    token: StopToken,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce(StopToken) + Send + 'static,
    {
        let token = StopToken::default();
        let t = token.clone();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || body(t))
            .map_err(|e| Error::io(format!("spawning worker {name}"), e))?;
        debug!(worker = name, "worker started");
        Ok(Self {
            name: name.to_owned(),
            token,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the worker and wait for it to exit.
    pub fn stop(&mut self) -> Result<()> {
        self.token.stop();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            // Stopped from its own body: the thread exits when the body returns.
            return Ok(());
        }
        handle
            .join()
            .map_err(|_| Error::internal(format!("worker {} panicked", self.name)))?;
        debug!(worker = %self.name, "worker stopped");
        Ok(())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
