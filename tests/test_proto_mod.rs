// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Module linking, the data path through a stack, relay workers and
// whole-stack operations.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{loopback, stack, Bare, Framing, Pass};
use protomod::{
    dump_stack, push_mod, shutdown_stack, stack_of, startup_stack, BufChain, ByteOrder,
    CoreConfig, Error, Loopback, ModRef, Module, PortCore, ProtoMod, ProtoPort, Protocol,
    Result, Timeout,
};

fn names(top: &ModRef) -> Vec<String> {
    stack_of(top).iter().map(|m| m.name().to_owned()).collect()
}

fn wait() -> Timeout {
    Timeout::After(Duration::from_secs(2))
}

// ---------------------------------------------------------------------------
// Linking
// ---------------------------------------------------------------------------

#[test]
fn add_at_port_links_both_ways() {
    let lb = loopback(4);
    let pass = Module::new(Pass("pass"), 0).expect("module");
    lb.add_at_port(pass.clone()).expect("add_at_port");

    assert_eq!(pass.upstream_mod().map(|m| m.name().to_owned()).as_deref(), Some("loopback"));
    assert_eq!(lb.downstream_mod().map(|m| m.name().to_owned()).as_deref(), Some("pass"));
    assert!(lb.upstream_port().is_none());
}

#[test]
fn second_downstream_is_rejected() {
    let lb = loopback(4);
    let a = Module::new(Pass("a"), 0).expect("module");
    let b = Module::new(Pass("b"), 0).expect("module");
    lb.add_at_port(a.clone()).expect("first");

    let err = lb.add_at_port(b.clone()).expect_err("second downstream");
    assert!(err.is_configuration());
    assert!(b.upstream_port().is_none());
    assert_eq!(lb.downstream_mod().map(|m| m.name().to_owned()).as_deref(), Some("a"));
}

#[test]
fn module_cannot_sit_on_itself() {
    let m = Module::new(Pass("self"), 4).expect("module");
    let err = m.add_at_port(m.clone()).expect_err("self link");
    assert!(err.is_configuration());
    assert!(m.upstream_port().is_none());
    assert!(m.downstream_mod().is_none());
    assert_eq!(names(&(m.clone() as ModRef)), ["self"]);
}

#[test]
fn link_that_closes_a_loop_is_rejected() {
    let a = Module::new(Pass("a"), 4).expect("module");
    let b = Module::new(Pass("b"), 0).expect("module");
    a.add_at_port(b.clone()).expect("a below b");

    assert!(matches!(b.add_at_port(a.clone()), Err(Error::Configuration(_))));
    assert!(a.upstream_port().is_none());
    assert!(b.downstream_mod().is_none());
    assert_eq!(names(&(b.clone() as ModRef)), ["a", "b"]);
}

#[test]
fn second_upstream_is_rejected() {
    let lb1 = loopback(4);
    let lb2 = loopback(4);
    let a = Module::new(Pass("a"), 0).expect("module");
    lb1.add_at_port(a.clone()).expect("first");

    assert!(matches!(lb2.add_at_port(a.clone()), Err(Error::Configuration(_))));
    assert!(lb2.downstream_mod().is_none());
    let up = a.upstream_port().expect("still attached");
    let lb1_port: protomod::PortRef = lb1.clone();
    assert!(Arc::ptr_eq(&up, &lb1_port));

    assert!(matches!(a.attach(lb2.clone()), Err(Error::Configuration(_))));
}

#[test]
fn push_mod_rejects_attached_pushee() {
    let lb = loopback(4);
    let a = Module::new(Pass("a"), 0).expect("module");
    let mut top: Option<ModRef> = None;
    push_mod(&mut top, lb).expect("bottom");
    push_mod(&mut top, a.clone()).expect("a");

    let mut other: Option<ModRef> = Some(loopback(4));
    let err = push_mod(&mut other, a).err().expect("already attached");
    assert!(err.is_configuration());
    assert_eq!(other.map(|m| m.name().to_owned()).as_deref(), Some("loopback"));
}

#[test]
fn dropped_downstream_frees_the_port() {
    let lb = loopback(4);
    {
        let a = Module::new(Pass("a"), 0).expect("module");
        lb.add_at_port(a).expect("add");
    }
    assert!(lb.downstream_mod().is_none());
    lb.add_at_port(Module::new(Pass("b"), 0).expect("module"))
        .expect("port is free again");
}

// ---------------------------------------------------------------------------
// Data path
// ---------------------------------------------------------------------------

#[test]
fn loopback_returns_what_was_pushed() {
    let lb = loopback(4);
    assert!(lb.push(BufChain::from_slice(b"ping"), &Timeout::Poll).expect("push"));
    assert!(lb.try_push(BufChain::from_slice(b"pong")).expect("push"));
    assert_eq!(lb.pop(&Timeout::Poll).expect("pop").map(|c| c.to_vec()), Some(b"ping".to_vec()));
    assert_eq!(lb.try_pop().expect("pop").map(|c| c.to_vec()), Some(b"pong".to_vec()));
    assert!(lb.try_pop().expect("pop").is_none());
}

#[test]
fn loopback_needs_a_queue() {
    assert!(matches!(
        Loopback::new().module(0, CoreConfig::default()),
        Err(Error::InvalidArg(_))
    ));
}

#[test]
fn framing_round_trip_over_loopback() {
    for order in [ByteOrder::Little, ByteOrder::Big] {
        let lb = loopback(4);
        let framing = Module::new(Framing::new(order), 0).expect("framing");
        let top = stack(vec![lb.clone() as ModRef, framing as ModRef]);

        assert!(top.push(BufChain::from_slice(b"payload"), &Timeout::Poll).expect("push"));

        // On the wire: header then payload.
        let raw = lb.core().queue().expect("queue").len();
        assert_eq!(raw, 1);

        let got = top.pop(&Timeout::Poll).expect("pop").expect("chain");
        assert_eq!(got.to_vec(), b"payload");
    }
}

#[test]
fn wire_format_carries_the_header() {
    let lb = loopback(4);
    let framing = Module::new(Framing::new(ByteOrder::Big), 0).expect("framing");
    lb.add_at_port(framing.clone()).expect("link");

    framing
        .push(BufChain::from_slice(&[7u8; 5]), &Timeout::Poll)
        .expect("push");
    let wire = lb.pop(&Timeout::Poll).expect("pop").expect("chain").to_vec();
    assert_eq!(wire, [0, 5, 7, 7, 7, 7, 7]);
}

#[test]
fn bypass_pop_times_out_through_the_stack() {
    let lb = loopback(4);
    let framing = Module::new(Framing::new(ByteOrder::Little), 0).expect("framing");
    lb.add_at_port(framing.clone()).expect("link");
    let start = std::time::Instant::now();
    assert!(framing.pop(&Timeout::from_millis(50)).expect("pop").is_none());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(45));
    assert!(elapsed < Duration::from_millis(250), "overslept: {elapsed:?}");
}

#[test]
fn queued_pop_times_out_within_bound() {
    let lb = loopback(4);
    let start = std::time::Instant::now();
    assert!(lb
        .pop(&Timeout::After(Duration::from_millis(50)))
        .expect("pop")
        .is_none());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(45), "woke early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(250), "overslept: {elapsed:?}");
}

#[test]
fn offline_loopback_drops_traffic() {
    let lb = loopback(4);
    lb.set_offline(true);
    assert!(lb.is_offline());
    assert!(!lb.push(BufChain::from_slice(b"lost"), &Timeout::Poll).expect("push"));
    assert!(lb.pop(&Timeout::Poll).expect("pop").is_none());

    lb.set_offline(false);
    assert!(lb.push(BufChain::from_slice(b"kept"), &Timeout::Poll).expect("push"));
    assert!(lb.pop(&Timeout::Poll).expect("pop").is_some());
}

#[test]
fn full_loopback_reports_not_accepted() {
    let cfg = CoreConfig {
        push_retry_ns: 0,
        ..CoreConfig::default()
    };
    let lb = Loopback::new().module(1, cfg).expect("loopback");
    assert!(lb.push(BufChain::from_slice(b"1"), &Timeout::Poll).expect("push"));
    assert!(!lb.push(BufChain::from_slice(b"2"), &Timeout::Poll).expect("push"));
    assert_eq!(lb.pop(&Timeout::Poll).expect("pop").map(|c| c.to_vec()), Some(b"1".to_vec()));
}

#[test]
fn push_down_reaches_the_queued_downstream() {
    let lb = loopback(4);
    let framing = Module::new(Framing::new(ByteOrder::Little), 0).expect("framing");
    let sink = Module::new(Pass("sink"), 4).expect("sink");
    stack(vec![lb as ModRef, framing.clone() as ModRef, sink.clone() as ModRef]);

    assert!(framing.push_down(BufChain::from_slice(b"up")).expect("push_down"));
    assert_eq!(sink.pop(&Timeout::Poll).expect("pop").map(|c| c.to_vec()), Some(b"up".to_vec()));
}

#[test]
fn push_down_without_destination_is_a_configuration_error() {
    let pass = Module::new(Pass("alone"), 0).expect("module");
    assert!(matches!(
        pass.push_down(BufChain::from_slice(b"x")),
        Err(Error::Configuration(_))
    ));
}

// ---------------------------------------------------------------------------
// Error reporting
// ---------------------------------------------------------------------------

#[test]
fn missing_upstream_is_a_configuration_error() {
    let pass = Module::new(Pass("alone"), 0).expect("module");
    assert!(matches!(pass.pop(&Timeout::Poll), Err(Error::Configuration(_))));
    assert!(matches!(pass.try_pop(), Err(Error::Configuration(_))));
    assert!(matches!(
        pass.push(BufChain::from_slice(b"x"), &Timeout::Poll),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(pass.must_get_upstream_port(), Err(Error::Configuration(_))));
}

#[test]
fn unimplemented_hooks_are_configuration_errors() {
    let lb = loopback(4);
    let bare = Module::new(Bare, 0).expect("module");
    lb.add_at_port(bare.clone()).expect("link");

    assert!(matches!(
        bare.push(BufChain::from_slice(b"x"), &Timeout::Poll),
        Err(Error::Configuration(_))
    ));

    lb.push(BufChain::from_slice(b"x"), &Timeout::Poll).expect("push");
    assert!(matches!(bare.pop(&Timeout::Poll), Err(Error::Configuration(_))));
}

#[test]
fn unsupported_clone_is_reported() {
    let bare = Module::new(Bare, 0).expect("module");
    assert!(matches!(bare.clone_mod(), Err(Error::Internal(_))));

    let lb = loopback(4);
    let top = stack(vec![lb as ModRef, bare as ModRef]);
    assert!(top.clone_stack().is_err());
}

#[test]
fn abs_timeout_needs_a_queue() {
    let bypass = Module::new(Pass("bypass"), 0).expect("module");
    assert!(matches!(
        bypass.core().abs_timeout(&Timeout::from_millis(1)),
        Err(Error::Configuration(_))
    ));
    let lb = loopback(1);
    assert!(lb
        .core()
        .abs_timeout(&Timeout::from_millis(1))
        .expect("abs")
        .is_absolute());
}

// ---------------------------------------------------------------------------
// Whole-stack operations
// ---------------------------------------------------------------------------

#[test]
fn stack_of_lists_bottom_first() {
    let top = stack(vec![
        loopback(4) as ModRef,
        Module::new(Pass("mid"), 0).expect("mid") as ModRef,
        Module::new(Pass("top"), 2).expect("top") as ModRef,
    ]);
    assert_eq!(names(&top), ["loopback", "mid", "top"]);
}

#[test]
fn clone_stack_copies_every_module() {
    let lb = loopback(4);
    lb.set_offline(true);
    let top = stack(vec![
        lb.clone() as ModRef,
        Module::new(Framing::new(ByteOrder::Big), 0).expect("framing") as ModRef,
        Module::new(Pass("top"), 0).expect("top") as ModRef,
    ]);

    let copy = top.clone_stack().expect("clone_stack");
    assert_eq!(names(&copy), names(&top));

    for (orig, cloned) in stack_of(&top).iter().zip(stack_of(&copy).iter()) {
        assert!(!Arc::ptr_eq(orig, cloned));
    }
    // Offline state travels with the clone.
    assert!(stack_of(&copy)[0].is_offline());

    // Original links are untouched.
    assert_eq!(names(&top), ["loopback", "framing", "top"]);

    // The copy is an independent loop.
    stack_of(&copy)[0].set_offline(false);
    assert!(copy.push(BufChain::from_slice(b"copy"), &Timeout::Poll).expect("push"));
    assert_eq!(copy.pop(&Timeout::Poll).expect("pop").map(|c| c.to_vec()), Some(b"copy".to_vec()));
    assert!(lb.core().queue().expect("queue").is_empty());
}

#[test]
fn relay_worker_moves_chains_up() {
    let lb = loopback(8);
    let framing = Module::new(Framing::new(ByteOrder::Little), 0).expect("framing");
    let relay = Module::new(Pass("relay"), 8).expect("relay");
    let top = stack(vec![lb.clone() as ModRef, framing as ModRef, relay.clone() as ModRef]);

    startup_stack(&top).expect("startup");
    assert!(relay.has_worker());
    assert!(!lb.has_worker(), "transport has no upstream to relay from");

    for msg in [&b"one"[..], b"two", b"three"] {
        assert!(top.push(BufChain::from_slice(msg), &Timeout::Poll).expect("push"));
    }
    for msg in [&b"one"[..], b"two", b"three"] {
        let got = top.pop(&wait()).expect("pop").expect("chain");
        assert_eq!(got.to_vec(), msg);
    }

    shutdown_stack(&top).expect("shutdown");
    assert!(!relay.has_worker());
}

#[test]
fn relay_survives_a_malformed_chain() {
    let lb = loopback(8);
    let framing = Module::new(Framing::new(ByteOrder::Little), 0).expect("framing");
    let relay = Module::new(Pass("relay"), 8).expect("relay");
    let top = stack(vec![lb.clone() as ModRef, framing as ModRef, relay as ModRef]);
    startup_stack(&top).expect("startup");

    // A runt frame injected below the framing layer.
    lb.push(BufChain::from_slice(b"x"), &Timeout::Poll).expect("push");
    top.push(BufChain::from_slice(b"good"), &Timeout::Poll).expect("push");

    let got = top.pop(&wait()).expect("pop").expect("chain");
    assert_eq!(got.to_vec(), b"good");
    shutdown_stack(&top).expect("shutdown");
}

#[test]
fn startup_and_shutdown_order() {
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Protocol for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn startup(&self, _core: &PortCore) -> Result<()> {
            self.log.lock().unwrap().push(format!("start {}", self.name));
            Ok(())
        }

        fn shutdown(&self, _core: &PortCore) -> Result<()> {
            self.log.lock().unwrap().push(format!("stop {}", self.name));
            Ok(())
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let rec = |name| Recorder {
        name,
        log: Arc::clone(&log),
    };
    let top = stack(vec![
        Module::new(rec("bottom"), 0).expect("bottom") as ModRef,
        Module::new(rec("middle"), 0).expect("middle") as ModRef,
        Module::new(rec("top"), 0).expect("top") as ModRef,
    ]);

    startup_stack(&top).expect("startup");
    shutdown_stack(&top).expect("shutdown");
    assert_eq!(
        *log.lock().unwrap(),
        [
            "start bottom",
            "start middle",
            "start top",
            "stop top",
            "stop middle",
            "stop bottom"
        ]
    );
}

#[test]
fn dump_stack_lists_top_first() {
    let top = stack(vec![
        Loopback::with_dest_port(8192)
            .module(8, CoreConfig::default())
            .expect("loopback") as ModRef,
        Module::new(Framing::new(ByteOrder::Little), 0).expect("framing") as ModRef,
    ]);
    let mut out = Vec::new();
    dump_stack(&top, &mut out).expect("dump");
    let text = String::from_utf8(out).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "framing: online, bypass");
    assert_eq!(lines[1], "  loopback:8192: online, queue 0/8");
    assert!(text.contains("dest port 8192"));
}
