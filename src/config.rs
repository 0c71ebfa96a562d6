// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Core tunables, loadable from a TOML document.
//
// Every module is built with an explicit `CoreConfig`; there is no
// process-global mutable state (byte order included).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_CAPACITY;
use crate::error::{Error, Result};

/// Byte order of the remote device's register space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the host this process runs on.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn is_native(self) -> bool {
        self == Self::native()
    }

    /// Encode `v` in this byte order.
    pub fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    /// Decode a `u16` stored in this byte order.
    pub fn read_u16(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

/// Tunables shared by pools, queues and modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Default capacity of buffers handed out by a pool built from this config.
    pub buf_capacity: usize,
    /// Output-queue depth used by helpers that build queued modules.
    pub queue_depth: usize,
    /// Delay before the single retry of a push into a full queue.
    pub push_retry_ns: u64,
    /// Poll period of relay workers; bounds how long shutdown waits.
    pub worker_poll_ms: u64,
    /// Byte order of the device behind the stack.
    pub byte_order: ByteOrder,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            buf_capacity: DEFAULT_CAPACITY,
            queue_depth: 32,
            push_retry_ns: 1_000,
            worker_poll_ms: 50,
            byte_order: ByteOrder::native(),
        }
    }
}

impl CoreConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: CoreConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML (e.g. to print the effective configuration).
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::internal(format!("serializing config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.buf_capacity == 0 {
            return Err(Error::config("buf_capacity must be non-zero"));
        }
        if self.queue_depth == 0 {
            return Err(Error::config("queue_depth must be non-zero"));
        }
        Ok(())
    }

    pub fn push_retry_interval(&self) -> Duration {
        Duration::from_nanos(self.push_retry_ns)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_ms)
    }
}
