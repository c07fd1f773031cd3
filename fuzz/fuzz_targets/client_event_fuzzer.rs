//! Fuzz target for the client under arbitrary event interleavings
//!
//! # Strategy
//!
//! - Transport: handshakes, refusals and drops on current and stale sessions
//! - Backend: messages, echoes, history, typing and presence from a small
//!   user pool so ids collide often
//! - Time: advances of up to a minute between steps
//!
//! # Invariants
//!
//! The standard registry: unique message ids, unique typists, no self
//! typing, attempts within the cap, router bound only to the live session.

#![no_main]

use std::{sync::Arc, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use murmur_client::MessageDraft;
use murmur_harness::{FakeAuth, InvariantRegistry, SimDriver};
use serde_json::json;

const USERS: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Connect,
    Accept,
    Refuse,
    Drop,
    Disconnect,
    Advance(u16),
    Send,
    Echo { server_id: u8 },
    Incoming { id: u8, sender: u8 },
    History(Vec<u8>),
    Typing { user: u8, start: bool },
    Presence { user: u8, online: bool },
    Raw { name: u8, payload: String },
}

const NAMES: [&str; 6] =
    ["message:received", "message:history", "typing:start", "user:online", "users:received", "chatRoom:created"];

fn user(index: u8) -> &'static str {
    USERS[usize::from(index) % USERS.len()]
}

fuzz_target!(|ops: Vec<Op>| {
    let mut driver = SimDriver::new(Arc::new(FakeAuth::signed_in("alice", "Alice")))
        .with_invariants(InvariantRegistry::standard());

    for op in ops {
        match op {
            Op::Connect => {
                let _ = driver.connect();
            },
            Op::Accept => {
                driver.accept_latest();
            },
            Op::Refuse => {
                driver.refuse_latest("refused");
            },
            Op::Drop => {
                driver.drop_latest("reset");
            },
            Op::Disconnect => {
                driver.client_mut().disconnect();
                driver.pump();
            },
            Op::Advance(ms) => driver.advance(Duration::from_millis(u64::from(ms))),
            Op::Send => {
                let _ = driver.client_mut().send_message(MessageDraft::text("r1", "x"));
                driver.pump();
            },
            Op::Echo { server_id } => {
                if let Some(temp) = driver.client().messages().pending().first().cloned() {
                    let _ = driver.deliver(
                        "message:received",
                        json!({"id": format!("s{server_id}"), "senderId": "alice", "timestamp": 1, "clientId": temp.id}),
                    );
                }
            },
            Op::Incoming { id, sender } => {
                let _ = driver.deliver(
                    "message:received",
                    json!({"id": format!("m{id}"), "senderId": user(sender), "timestamp": id}),
                );
            },
            Op::History(ids) => {
                let batch: Vec<_> = ids
                    .into_iter()
                    .map(|id| json!({"id": format!("m{id}"), "senderId": "bob", "timestamp": id}))
                    .collect();
                let _ = driver.deliver("message:history", json!(batch));
            },
            Op::Typing { user: index, start } => {
                let name = if start { "typing:start" } else { "typing:stop" };
                let _ = driver.deliver(name, json!({"userId": user(index)}));
            },
            Op::Presence { user: index, online } => {
                let name = if online { "user:online" } else { "user:offline" };
                let _ = driver.deliver(name, json!({"userId": user(index)}));
            },
            Op::Raw { name, payload } => {
                if let Ok(value) = serde_json::from_str(&payload) {
                    let _ = driver.deliver(NAMES[usize::from(name) % NAMES.len()], value);
                }
            },
        }
    }

    assert!(driver.violations().is_empty(), "violations: {:?}", driver.violations());
});
