//! Fuzz target for inbound frame decoding
//!
//! Feeds arbitrary text through `Envelope::from_text` and
//! `InboundEvent::decode` to find:
//! - Panics on malformed JSON or unexpected payload shapes
//! - Timestamp strings that crash the RFC 3339 path
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use murmur_proto::{Envelope, InboundEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(envelope) = Envelope::from_text(text) {
        let _ = InboundEvent::decode(&envelope.event, envelope.data);
    }
});
