// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Transport core for layered protocol stacks: pooled buffers and buffer
// chains, bounded blocking chain queues, stackable protocol modules with
// optional relay workers, and parameter matching to share existing stacks.

mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{ByteOrder, CoreConfig};

mod timeout;
pub use timeout::Timeout;

pub mod buffer;
pub use buffer::{num_bufs_alloced, num_bufs_free, num_bufs_in_use, Buf, BufPool, PoolStats};

mod buf_chain;
pub use buf_chain::BufChain;

mod platform;

mod semaphore;
pub use semaphore::Semaphore;

pub mod buf_queue;
pub use buf_queue::BufQueue;

mod port;
pub use port::{PortRef, ProtoPort};

pub mod proto_mod;
pub use proto_mod::{dump_stack, push_mod, shutdown_stack, stack_of, startup_stack, ModRef, ProtoMod};

mod module;
pub use module::{Module, PortCore, Protocol};

mod worker;
pub use worker::{StopToken, Worker};

mod match_params;
pub use match_params::{Constraint, MatchParam, ProtoPortMatchParams};

mod registry;
pub use registry::{StackKey, StackRegistry};

mod loopback;
pub use loopback::Loopback;
