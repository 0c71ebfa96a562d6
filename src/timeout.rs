// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Timeout specification accepted by every blocking operation.

use std::time::{Duration, SystemTime};

/// How long a `pop`/`push` may block.
///
/// Relative timeouts are turned into absolute ones only by the resource that
/// owns the clock (see `BufQueue::abs_timeout`); different queues may in
/// principle use different clocks, so generic callers never convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Block until data arrives.
    #[default]
    Indefinite,
    /// Do not block; poll once.
    Poll,
    /// Block for at most this long, measured from the call.
    After(Duration),
    /// Block until this point on the realtime clock.
    At(SystemTime),
}

impl Timeout {
    pub fn from_millis(ms: u64) -> Self {
        Timeout::After(Duration::from_millis(ms))
    }

    pub fn from_micros(us: u64) -> Self {
        Timeout::After(Duration::from_micros(us))
    }

    pub fn is_indefinite(&self) -> bool {
        matches!(self, Timeout::Indefinite)
    }

    pub fn is_poll(&self) -> bool {
        matches!(self, Timeout::Poll)
    }

    pub fn is_absolute(&self) -> bool {
        matches!(self, Timeout::At(_))
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Timeout::Indefinite, Timeout::After)
    }
}
