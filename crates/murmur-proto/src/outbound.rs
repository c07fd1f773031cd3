//! Outbound events.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{MessageType, ProtocolError, Result};

/// Payload of `message:send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Message body.
    pub text: String,
    /// Author's user id.
    pub sender_id: String,
    /// Destination room.
    pub chat_room_id: String,
    /// Content kind.
    pub message_type: MessageType,
    /// Author's display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Temporary id of the optimistic copy, echoed back by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Events the client emits to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// `message:send`
    SendMessage(SendMessageRequest),
    /// `message:markRead`
    MarkRead {
        /// Message to mark.
        message_id: String,
    },
    /// `user:typing:start`
    TypingStart {
        /// Current user.
        user_id: String,
    },
    /// `user:typing:stop`
    TypingStop {
        /// Current user.
        user_id: String,
    },
    /// `room:join`
    JoinRoom {
        /// Room to join.
        chat_room_id: String,
    },
    /// `room:leave`
    LeaveRoom {
        /// Room to leave.
        chat_room_id: String,
    },
    /// `users:get`
    FetchUsers {
        /// Current user.
        user_id: String,
    },
    /// `chatroom:getOrCreate`
    GetOrCreateChatRoom {
        /// Current user.
        current_user_id: String,
        /// Peer to chat with.
        with_user_id: String,
    },
}

impl OutboundEvent {
    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "message:send",
            Self::MarkRead { .. } => "message:markRead",
            Self::TypingStart { .. } => "user:typing:start",
            Self::TypingStop { .. } => "user:typing:stop",
            Self::JoinRoom { .. } => "room:join",
            Self::LeaveRoom { .. } => "room:leave",
            Self::FetchUsers { .. } => "users:get",
            Self::GetOrCreateChatRoom { .. } => "chatroom:getOrCreate",
        }
    }

    /// JSON payload.
    pub fn payload(&self) -> Result<Value> {
        let value = match self {
            Self::SendMessage(request) => {
                serde_json::to_value(request).map_err(|e| ProtocolError::Encode(e.to_string()))?
            },
            Self::MarkRead { message_id } => json!({ "messageId": message_id }),
            Self::TypingStart { user_id }
            | Self::TypingStop { user_id }
            | Self::FetchUsers { user_id } => json!({ "userId": user_id }),
            Self::JoinRoom { chat_room_id } | Self::LeaveRoom { chat_room_id } => {
                json!({ "chatRoomId": chat_room_id })
            },
            Self::GetOrCreateChatRoom { current_user_id, with_user_id } => {
                json!({ "currentUserId": current_user_id, "withUserId": with_user_id })
            },
        };

        Ok(value)
    }
}
