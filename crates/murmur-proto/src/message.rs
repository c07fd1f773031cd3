//! Chat message model.

use serde::{Deserialize, Serialize};

/// Prefix of locally generated ids for messages not yet confirmed by the
/// server.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Kind of message content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Plain text.
    #[default]
    Text,
    /// Image attachment.
    Image,
    /// File attachment.
    File,
}

/// A chat message as seen by the client.
///
/// `id` is server-issued, or a [`TEMP_ID_PREFIX`]-prefixed local id while the
/// message is optimistic. `client_id` carries the temporary id through the
/// server round trip so the confirmed copy can replace the optimistic one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server id or temporary id.
    pub id: String,
    /// Message body.
    #[serde(default)]
    pub text: String,
    /// Author's user id.
    pub sender_id: String,
    /// Author's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Room the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_room_id: Option<String>,
    /// Epoch milliseconds.
    #[serde(with = "crate::timestamp")]
    pub timestamp: u64,
    /// Content kind.
    #[serde(default)]
    pub message_type: MessageType,
    /// Read flag.
    #[serde(default)]
    pub is_read: bool,
    /// Temporary id echoed back by the server for own messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Message {
    /// Whether this message still carries a local temporary id.
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// Whether this message belongs to `room_id`.
    pub fn in_room(&self, room_id: &str) -> bool {
        self.chat_room_id.as_deref() == Some(room_id)
    }
}
