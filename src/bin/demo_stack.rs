// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Builds a three-layer stack and moves a few chains through it.
//
// Usage:
//   demo_stack [config.toml]
//
// Layers, bottom first:
//   loopback  transport whose pushes come back out of its own queue
//   framing   bypass module adding/stripping a u16 length header
//   counter   queued module; its relay worker drains framing
//
// Set RUST_LOG=protomod=debug to watch the modules start and stop.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use protomod::{
    dump_stack, push_mod, shutdown_stack, startup_stack, BufChain, BufPool, ByteOrder,
    CoreConfig, Error, Loopback, ModRef, Module, Protocol, Result, Timeout,
};

const HEADER_LEN: usize = 2;

// ---------------------------------------------------------------------------
// Protocols
// ---------------------------------------------------------------------------

struct Framing {
    order: ByteOrder,
    pool: BufPool,
}

impl Protocol for Framing {
    fn name(&self) -> &str {
        "framing"
    }

    fn process_output(&self, mut chain: BufChain) -> Result<BufChain> {
        let len = u16::try_from(chain.size())
            .map_err(|_| Error::InvalidArg(format!("frame of {} bytes", chain.size())))?;
        let hdr = chain.create_at_head(&self.pool, HEADER_LEN);
        hdr.payload_mut().copy_from_slice(&self.order.u16_bytes(len));
        Ok(chain)
    }

    fn process_input(&self, mut chain: BufChain) -> Result<BufChain> {
        let mut hdr = [0u8; HEADER_LEN];
        if chain.extract(&mut hdr, 0) != HEADER_LEN {
            return Err(Error::InvalidArg("runt frame".into()));
        }
        let len = usize::from(self.order.read_u16(hdr));
        if len != chain.size() - HEADER_LEN {
            return Err(Error::InvalidArg(format!(
                "header says {len} bytes, frame carries {}",
                chain.size() - HEADER_LEN
            )));
        }
        let mut strip = HEADER_LEN;
        while strip > 0 {
            let Some(head) = chain.get_mut(0) else { break };
            if head.size() > strip {
                let off = head.offset() + strip;
                head.set_payload_offset(off)?;
                strip = 0;
            } else {
                strip -= head.size();
                chain.unlink(0)?;
            }
        }
        Ok(chain)
    }

    fn clone_protocol(&self) -> Result<Self> {
        Ok(Framing {
            order: self.order,
            pool: self.pool.clone(),
        })
    }
}

#[derive(Default)]
struct Counter {
    seen: AtomicUsize,
}

impl Protocol for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn process_input(&self, chain: BufChain) -> Result<BufChain> {
        self.seen.fetch_add(1, Ordering::Relaxed);
        Ok(chain)
    }

    fn process_output(&self, chain: BufChain) -> Result<BufChain> {
        Ok(chain)
    }

    fn clone_protocol(&self) -> Result<Self> {
        Ok(Counter::default())
    }

    fn dump_info(&self, w: &mut dyn io::Write) -> io::Result<()> {
        writeln!(w, "    chains seen: {}", self.seen.load(Ordering::Relaxed))
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn build(cfg: &CoreConfig) -> Result<ModRef> {
    let pool = BufPool::from_config("demo", cfg);
    let mut top: Option<ModRef> = None;
    push_mod(&mut top, Loopback::new().module(cfg.queue_depth, cfg.clone())?)?;
    push_mod(
        &mut top,
        Module::with_config(
            Framing {
                order: cfg.byte_order,
                pool,
            },
            0,
            cfg.clone(),
        )?,
    )?;
    push_mod(
        &mut top,
        Module::with_config(Counter::default(), cfg.queue_depth, cfg.clone())?,
    )
}

fn dump_failed(source: io::Error) -> Error {
    Error::Io {
        context: "writing stack dump".into(),
        source,
    }
}

fn run() -> Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    println!("effective configuration:\n{}", cfg.to_toml_string()?);

    let top = build(&cfg)?;
    startup_stack(&top)?;

    for msg in ["hello", "layered", "world"] {
        let sent = top.push(BufChain::from_slice(msg.as_bytes()), &Timeout::Poll)?;
        println!("push {msg:?}: {}", if sent { "ok" } else { "dropped" });
    }
    // The first chain waits for the relay worker to come up.
    let mut wait = Timeout::After(Duration::from_millis(500));
    while let Some(chain) = top.pop(&wait)? {
        println!("pop  {:?}", String::from_utf8_lossy(&chain.to_vec()));
        wait = Timeout::from_millis(100);
    }

    let copy = top.clone_stack()?;
    println!("\noriginal stack:");
    dump_stack(&top, &mut io::stdout()).map_err(dump_failed)?;
    println!("\ncloned stack:");
    dump_stack(&copy, &mut io::stdout()).map_err(dump_failed)?;

    shutdown_stack(&top)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    if let Err(e) = run() {
        eprintln!("demo_stack: {e}");
        std::process::exit(1);
    }
}
