//! End-to-end chat flows against a scripted backend.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use murmur_client::{ConnectionState, MessageDraft};
use murmur_harness::{FakeAuth, InvariantRegistry, SimDriver};
use murmur_proto::OutboundEvent;
use serde_json::json;

fn connected() -> SimDriver {
    let mut driver = SimDriver::new(Arc::new(FakeAuth::signed_in("alice", "Alice")))
        .with_invariants(InvariantRegistry::standard());
    driver.connect().unwrap();
    driver.accept_latest().unwrap();
    driver
}

fn ids(driver: &SimDriver) -> Vec<String> {
    driver.client().messages().log().messages().iter().map(|m| m.id.clone()).collect()
}

#[test]
fn sent_message_is_confirmed_and_reply_appended() {
    let mut driver = connected();
    driver.client_mut().join_room("r1").unwrap();

    let optimistic = driver.client_mut().send_message(MessageDraft::text("r1", "hi")).unwrap();
    driver.pump();

    assert!(optimistic.is_temporary());
    assert_eq!(driver.client().messages().pending().len(), 1);

    let sent = driver.take_emitted().into_iter().find_map(|outbound| match outbound.event {
        OutboundEvent::SendMessage(request) => Some(request),
        _ => None,
    });
    let sent = sent.unwrap();
    assert_eq!(sent.text, "hi");
    assert_eq!(sent.chat_room_id, "r1");
    assert_eq!(sent.client_id.as_deref(), Some(optimistic.id.as_str()));

    driver
        .deliver(
            "message:received",
            json!({
                "id": "m1",
                "text": "hi",
                "senderId": "alice",
                "senderName": "Alice",
                "chatRoomId": "r1",
                "timestamp": "2024-01-01T00:00:00.000Z",
                "clientId": optimistic.id,
            }),
        )
        .unwrap();
    driver
        .deliver(
            "message:received",
            json!({
                "id": "m2",
                "text": "hey",
                "senderId": "bob",
                "senderName": "Bob",
                "chatRoomId": "r1",
                "timestamp": 1_704_067_201_000_u64,
            }),
        )
        .unwrap();

    assert_eq!(ids(&driver), vec!["m1", "m2"]);
    assert!(driver.client().messages().pending().is_empty());
    assert_eq!(driver.client().messages().messages_in_room("r1").len(), 2);
    assert!(driver.violations().is_empty(), "{:?}", driver.violations());
}

#[test]
fn own_echo_without_client_id_is_not_duplicated() {
    let mut driver = connected();

    driver.client_mut().send_message(MessageDraft::text("r1", "hi")).unwrap();
    driver.pump();
    driver
        .deliver(
            "message:received",
            json!({"id": "m1", "text": "hi", "senderId": "alice", "chatRoomId": "r1", "timestamp": 1}),
        )
        .unwrap();

    assert_eq!(driver.client().messages().log().len(), 1);
    assert!(driver.client().messages().log().messages()[0].is_temporary());
}

#[test]
fn history_then_live_messages_keep_order_without_duplicates() {
    let mut driver = connected();

    driver
        .deliver(
            "message:history",
            json!([
                {"id": "m1", "senderId": "bob", "text": "one", "timestamp": 1},
                {"id": "m2", "senderId": "alice", "text": "two", "timestamp": 2},
            ]),
        )
        .unwrap();
    driver
        .deliver(
            "message:received",
            json!({"id": "m3", "senderId": "bob", "text": "three", "timestamp": 3}),
        )
        .unwrap();
    driver
        .deliver(
            "chatRoom:history",
            json!([
                {"id": "m2", "senderId": "alice", "text": "two", "timestamp": 2},
                {"id": "m3", "senderId": "bob", "text": "three", "timestamp": 3},
            ]),
        )
        .unwrap();

    assert_eq!(ids(&driver), vec!["m1", "m2", "m3"]);
    assert!(driver.violations().is_empty(), "{:?}", driver.violations());
}

#[test]
fn send_lost_to_a_drop_is_confirmed_by_history_replay() {
    let mut driver = connected();
    driver.client_mut().join_room("r1").unwrap();
    driver
        .deliver(
            "message:received",
            json!({"id": "m0", "senderId": "bob", "chatRoomId": "r1", "timestamp": 1}),
        )
        .unwrap();

    let optimistic = driver.client_mut().send_message(MessageDraft::text("r1", "hi")).unwrap();
    driver.pump();

    driver.drop_latest("reset").unwrap();
    driver.advance_to_deadline().unwrap();
    driver.accept_latest().unwrap();
    assert_eq!(driver.client().messages().pending().len(), 1);

    driver
        .deliver(
            "chatRoom:history",
            json!([
                {"id": "m0", "senderId": "bob", "chatRoomId": "r1", "timestamp": 1},
                {
                    "id": "m1",
                    "senderId": "alice",
                    "text": "hi",
                    "chatRoomId": "r1",
                    "timestamp": 2,
                    "clientId": optimistic.id,
                },
            ]),
        )
        .unwrap();

    assert_eq!(ids(&driver), vec!["m0", "m1"]);
    assert!(driver.client().messages().pending().is_empty());
    assert!(driver.violations().is_empty(), "{:?}", driver.violations());
}

#[test]
fn handlers_do_not_accumulate_across_reconnects() {
    let mut driver = connected();

    for _ in 0..3 {
        driver.drop_latest("reset").unwrap();
        driver.advance_to_deadline().unwrap();
        driver.accept_latest().unwrap();
    }

    driver
        .deliver("message:received", json!({"id": "m1", "senderId": "bob", "timestamp": 1}))
        .unwrap();

    assert_eq!(driver.client().messages().log().len(), 1);
    assert_eq!(driver.client().router().installs(), 4);
    assert_eq!(driver.client().router().bound(), driver.latest_session());
    assert!(driver.violations().is_empty(), "{:?}", driver.violations());
}

#[test]
fn presence_updates_are_idempotent() {
    let mut driver = connected();

    driver.deliver("user:online", json!({"userId": "bob"})).unwrap();
    driver.deliver("user:online", json!({"userId": "bob"})).unwrap();
    driver.deliver("user:online", json!({"userId": "carol"})).unwrap();
    assert_eq!(driver.client().presence().count(), 2);

    driver.deliver("user:offline", json!({"userId": "bob"})).unwrap();
    driver.deliver("user:offline", json!({"userId": "bob"})).unwrap();
    driver.deliver("user:offline", json!({"userId": "dave"})).unwrap();

    assert!(!driver.client().presence().is_online("bob"));
    assert_eq!(driver.client().presence().online_users(), vec!["carol".to_owned()]);
}

#[test]
fn remote_typing_expires_exactly_once() {
    let mut driver = connected();
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changes);
    driver.client_mut().typing_mut().subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    driver.deliver("typing:start", json!({"userId": "bob", "userName": "Bob"})).unwrap();
    assert_eq!(driver.client().typing().summary().as_deref(), Some("Bob is typing..."));

    driver.advance(Duration::from_millis(4999));
    assert_eq!(driver.client().typing().typing_names(), vec!["Bob".to_owned()]);

    driver.advance(Duration::from_millis(1));
    assert!(driver.client().typing().entries().is_empty());

    driver.advance(Duration::from_secs(10));
    assert_eq!(changes.load(Ordering::SeqCst), 2);
}

#[test]
fn refreshed_typing_pushes_expiry_back() {
    let mut driver = connected();

    driver.deliver("typing:start", json!({"userId": "bob"})).unwrap();
    driver.advance(Duration::from_secs(4));
    driver.deliver("typing:start", json!({"userId": "bob"})).unwrap();
    driver.advance(Duration::from_secs(4));

    assert_eq!(driver.client().typing().typing_names(), vec!["bob".to_owned()]);
    assert!(driver.violations().is_empty(), "{:?}", driver.violations());
}

#[test]
fn own_typing_echo_is_ignored() {
    let mut driver = connected();

    driver.deliver("typing:start", json!({"userId": "alice", "userName": "Alice"})).unwrap();

    assert!(driver.client().typing().entries().is_empty());
}

#[test]
fn local_typing_stops_after_idle() {
    let mut driver = connected();
    driver.take_emitted();

    assert!(driver.client_mut().start_typing().unwrap());
    driver.advance(Duration::from_secs(1));
    assert!(!driver.client_mut().start_typing().unwrap());
    driver.pump();

    driver.advance(Duration::from_millis(2999));
    assert_eq!(driver.emitted_names(), vec!["user:typing:start"]);

    driver.advance(Duration::from_millis(1));
    driver.advance(Duration::from_secs(5));
    assert_eq!(driver.emitted_names(), vec!["user:typing:start", "user:typing:stop"]);
}

#[test]
fn dropping_the_connection_clears_typing() {
    let mut driver = connected();
    driver.deliver("typing:start", json!({"userId": "bob"})).unwrap();

    driver.drop_latest("reset").unwrap();

    assert!(driver.client().typing().entries().is_empty());
    assert_eq!(driver.client().state(), ConnectionState::Reconnecting { attempt: 1 });
}

#[test]
fn malformed_event_changes_nothing() {
    let mut driver = connected();

    let err = driver.deliver("message:received", json!({"text": 42})).unwrap_err();
    assert!(!err.is_transient());

    let err = driver.deliver("message:exploded", json!({})).unwrap_err();
    assert!(!err.is_transient());

    assert!(driver.client().messages().log().is_empty());
}

#[test]
fn send_while_reconnecting_is_refused() {
    let mut driver = connected();
    driver.drop_latest("reset").unwrap();

    let err = driver.client_mut().send_message(MessageDraft::text("r1", "hi")).unwrap_err();

    assert!(err.is_not_connected());
    assert!(driver.client().messages().log().is_empty());
    assert!(driver.client().messages().last_error().is_some());
}

#[test]
fn read_receipts_mark_messages() {
    let mut driver = connected();
    driver
        .deliver("message:received", json!({"id": "m1", "senderId": "bob", "timestamp": 1}))
        .unwrap();

    driver.deliver("message:read", json!({"messageId": "m1", "readBy": "bob"})).unwrap();

    assert!(driver.client().messages().log().get("m1").unwrap().is_read);
}

#[test]
fn opening_a_chat_promotes_the_peer_to_contact() {
    let mut driver = connected();
    driver
        .deliver(
            "users:received",
            json!({
                "connectedUsers": [],
                "nonConnectedUsers": [{"id": "bob", "name": "Bob"}],
            }),
        )
        .unwrap();

    driver.client_mut().open_chat_with("bob").unwrap();
    driver.pump();
    assert_eq!(driver.emitted_names().last(), Some(&"chatroom:getOrCreate"));

    driver
        .deliver(
            "chatRoom:created",
            json!({
                "id": "r9",
                "type": "private",
                "participants": [{"id": "alice", "name": "Alice"}, {"id": "bob", "name": "Bob"}],
            }),
        )
        .unwrap();
    driver
        .deliver(
            "message:received",
            json!({"id": "m1", "senderId": "bob", "text": "yo", "chatRoomId": "r9", "timestamp": 1}),
        )
        .unwrap();

    let state = driver.client().directory().state();
    let contact = state.contact("bob").unwrap();
    assert_eq!(contact.chat_room_id, "r9");
    assert_eq!(contact.unread_count, 1);
    assert_eq!(contact.last_message, "yo");
    assert!(state.users.non_connected_users.is_empty());
    assert!(state.room("r9").is_some());
}

#[test]
fn logout_forgets_everything() {
    let mut driver = connected();
    driver.client_mut().join_room("r1").unwrap();
    driver
        .deliver("message:received", json!({"id": "m1", "senderId": "bob", "timestamp": 1}))
        .unwrap();
    driver.deliver("user:online", json!({"userId": "bob"})).unwrap();

    driver.client_mut().logout();
    driver.pump();

    assert_eq!(driver.client().state(), ConnectionState::Disconnected);
    assert!(driver.client().messages().log().is_empty());
    assert_eq!(driver.client().presence().count(), 0);
    assert_eq!(driver.client().joined_rooms().count(), 0);
}
