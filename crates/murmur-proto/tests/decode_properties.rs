//! Property tests for inbound decoding.
//!
//! Decoding must never panic: arbitrary names and payloads either decode into
//! an event or produce a protocol error.

use murmur_proto::{Envelope, InboundEvent, ProtocolError};
use proptest::prelude::*;
use serde_json::{Value, json};

const KNOWN: &[&str] = &[
    "message:received",
    "message:history",
    "chatRoom:history",
    "message:read",
    "typing:start",
    "typing:stop",
    "user:online",
    "user:offline",
    "users:received",
    "chatRoom:created",
];

fn json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9:_-]{0,12}".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z]{1,10}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_decode_never_panics(
        name in prop::sample::select(KNOWN),
        payload in json_strategy(),
    ) {
        match InboundEvent::decode(name, payload) {
            Ok(event) => {
                let canonical = if name == "chatRoom:history" { "message:history" } else { name };
                prop_assert_eq!(event.name(), canonical);
            },
            Err(err) => {
                let is_malformed = matches!(err, ProtocolError::MalformedPayload { .. });
                prop_assert!(is_malformed);
            },
        }
    }

    #[test]
    fn prop_unknown_names_rejected(name in "[a-z]{1,8}:[a-z]{1,8}") {
        prop_assume!(!KNOWN.contains(&name.as_str()));
        let is_unknown = matches!(
            InboundEvent::decode(&name, Value::Null),
            Err(ProtocolError::UnknownEvent { .. })
        );
        prop_assert!(is_unknown);
    }

    #[test]
    fn prop_envelope_text_never_panics(text in ".{0,64}") {
        let _ = Envelope::from_text(&text);
    }
}

#[test]
fn presence_envelope_decodes_end_to_end() {
    let envelope = Envelope::from_text(r#"{"event":"user:online","data":{"userId":"u7"}}"#).unwrap();
    let event = InboundEvent::decode(&envelope.event, envelope.data).unwrap();

    assert!(matches!(event, InboundEvent::UserOnline(ref n) if n.user_id == "u7"));
}
