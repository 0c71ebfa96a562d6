// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy shared by every layer of a protocol stack.
//
// Timeouts are not errors: blocking operations report "no data" as
// `Ok(None)` / `Ok(false)`. Everything here is a real failure the caller
// must be able to tell apart from an empty result.

use std::io;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by buffers, queues, ports and modules.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller-code bug in how a stack was put together: double attachment,
    /// missing upstream, unimplemented transform hook, size mismatch.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A broken internal invariant, e.g. the read semaphore was decremented
    /// but the ring held no item.
    #[error("internal error: {0}")]
    Internal(String),

    /// An argument that can never be valid (bad timeout, index out of range).
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A blocking wait was interrupted by a signal. The caller may retry.
    #[error("interrupted: {0}")]
    Interrupted(String),

    /// An OS call outside the wait path failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A configuration document could not be parsed.
    #[error("malformed configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    pub(crate) fn invalid_arg(msg: impl Into<String>) -> Self {
        Error::InvalidArg(msg.into())
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Interrupted(_))
    }

    /// Whether this error reports a mis-assembled stack.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
