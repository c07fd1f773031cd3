//! Inbound events.
//!
//! Every event the backend can push is decoded here into [`InboundEvent`].
//! Names outside the table are rejected with [`ProtocolError::UnknownEvent`];
//! payloads that do not fit their event are rejected with
//! [`ProtocolError::MalformedPayload`].
//!
//! Lifecycle names (`connect`, `disconnect`, `connect_error`, `error`) are
//! transport signals, not application events, and are not decoded here.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{ChatRoom, Message, ProtocolError, Result, UserDirectory};

/// Payload of `message:read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    /// Message that was read.
    pub message_id: String,
    /// User who read it.
    #[serde(default)]
    pub read_by: Option<String>,
}

/// Payload of `typing:start` and `typing:stop`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    /// Typist's user id.
    pub user_id: String,
    /// Typist's display name.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Room the typist is in.
    #[serde(default)]
    pub chat_room_id: Option<String>,
}

/// Payload of `user:online` and `user:offline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceNotice {
    /// User whose presence changed.
    pub user_id: String,
}

/// Closed set of events the backend pushes to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `message:received`
    MessageReceived(Message),
    /// `message:history` or `chatRoom:history`
    History(Vec<Message>),
    /// `message:read`
    MessageRead(ReadReceipt),
    /// `typing:start`
    TypingStarted(TypingNotice),
    /// `typing:stop`
    TypingStopped(TypingNotice),
    /// `user:online`
    UserOnline(PresenceNotice),
    /// `user:offline`
    UserOffline(PresenceNotice),
    /// `users:received`
    UsersReceived(UserDirectory),
    /// `chatRoom:created`
    ChatRoomCreated(ChatRoom),
}

impl InboundEvent {
    /// `message:received`
    pub const MESSAGE_RECEIVED: &'static str = "message:received";
    /// `message:history`
    pub const MESSAGE_HISTORY: &'static str = "message:history";
    /// `chatRoom:history`
    pub const ROOM_HISTORY: &'static str = "chatRoom:history";
    /// `message:read`
    pub const MESSAGE_READ: &'static str = "message:read";
    /// `typing:start`
    pub const TYPING_START: &'static str = "typing:start";
    /// `typing:stop`
    pub const TYPING_STOP: &'static str = "typing:stop";
    /// `user:online`
    pub const USER_ONLINE: &'static str = "user:online";
    /// `user:offline`
    pub const USER_OFFLINE: &'static str = "user:offline";
    /// `users:received`
    pub const USERS_RECEIVED: &'static str = "users:received";
    /// `chatRoom:created`
    pub const CHAT_ROOM_CREATED: &'static str = "chatRoom:created";

    /// Decode a named event and its JSON payload.
    pub fn decode(name: &str, payload: Value) -> Result<Self> {
        let event = match name {
            Self::MESSAGE_RECEIVED => {
                Self::MessageReceived(parse(Self::MESSAGE_RECEIVED, payload)?)
            },
            Self::MESSAGE_HISTORY => Self::History(parse(Self::MESSAGE_HISTORY, payload)?),
            Self::ROOM_HISTORY => Self::History(parse(Self::ROOM_HISTORY, payload)?),
            Self::MESSAGE_READ => Self::MessageRead(parse(Self::MESSAGE_READ, payload)?),
            Self::TYPING_START => Self::TypingStarted(parse(Self::TYPING_START, payload)?),
            Self::TYPING_STOP => Self::TypingStopped(parse(Self::TYPING_STOP, payload)?),
            Self::USER_ONLINE => Self::UserOnline(parse(Self::USER_ONLINE, payload)?),
            Self::USER_OFFLINE => Self::UserOffline(parse(Self::USER_OFFLINE, payload)?),
            Self::USERS_RECEIVED => Self::UsersReceived(parse(Self::USERS_RECEIVED, payload)?),
            Self::CHAT_ROOM_CREATED => {
                Self::ChatRoomCreated(parse(Self::CHAT_ROOM_CREATED, payload)?)
            },
            other => return Err(ProtocolError::UnknownEvent { name: other.to_string() }),
        };

        Ok(event)
    }

    /// Canonical event name. History events report `message:history`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageReceived(_) => Self::MESSAGE_RECEIVED,
            Self::History(_) => Self::MESSAGE_HISTORY,
            Self::MessageRead(_) => Self::MESSAGE_READ,
            Self::TypingStarted(_) => Self::TYPING_START,
            Self::TypingStopped(_) => Self::TYPING_STOP,
            Self::UserOnline(_) => Self::USER_ONLINE,
            Self::UserOffline(_) => Self::USER_OFFLINE,
            Self::UsersReceived(_) => Self::USERS_RECEIVED,
            Self::ChatRoomCreated(_) => Self::CHAT_ROOM_CREATED,
        }
    }
}

fn parse<T: DeserializeOwned>(event: &'static str, payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| ProtocolError::MalformedPayload { event, reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn both_history_names_decode_to_history() {
        let batch = json!([{"id": "m1", "senderId": "u1", "timestamp": 1}]);

        let a = InboundEvent::decode("message:history", batch.clone()).unwrap();
        let b = InboundEvent::decode("chatRoom:history", batch).unwrap();

        assert_eq!(a, b);
        assert!(matches!(a, InboundEvent::History(ref m) if m.len() == 1));
    }

    #[test]
    fn typing_notice_without_name() {
        let event = InboundEvent::decode("typing:start", json!({"userId": "u2"})).unwrap();
        let InboundEvent::TypingStarted(notice) = event else {
            panic!("expected TypingStarted");
        };
        assert_eq!(notice.user_id, "u2");
        assert_eq!(notice.user_name, None);
    }

    #[test]
    fn unknown_event_is_rejected() {
        let err = InboundEvent::decode("message:exploded", json!({})).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownEvent { name: "message:exploded".into() });
    }

    #[test]
    fn lifecycle_names_are_not_application_events() {
        for name in ["connect", "disconnect", "connect_error", "error"] {
            assert!(InboundEvent::decode(name, Value::Null).is_err());
        }
    }

    #[test]
    fn malformed_payload_names_the_event() {
        let err = InboundEvent::decode("user:online", json!({"id": 7})).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedPayload { event: "user:online", .. }));
    }

    #[test]
    fn read_receipt_decodes() {
        let event =
            InboundEvent::decode("message:read", json!({"messageId": "m9", "readBy": "u2"}))
                .unwrap();
        assert_eq!(
            event,
            InboundEvent::MessageRead(ReadReceipt {
                message_id: "m9".into(),
                read_by: Some("u2".into())
            })
        );
        assert_eq!(event.name(), "message:read");
    }
}
