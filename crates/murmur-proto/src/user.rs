//! Users, contacts, and rooms.

use serde::{Deserialize, Serialize};

use crate::Message;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Last seen time as sent by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

/// A contact the current user already has a conversation with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedUser {
    /// The contact.
    pub user: User,
    /// Unread messages in the shared room.
    #[serde(default)]
    pub unread_count: u32,
    /// Shared room id.
    pub chat_room_id: String,
    /// Preview of the last message.
    #[serde(default)]
    pub last_message: String,
}

/// Payload of `users:received`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDirectory {
    /// Users with an existing conversation.
    #[serde(default)]
    pub connected_users: Vec<ConnectedUser>,
    /// Everyone else.
    #[serde(default)]
    pub non_connected_users: Vec<User>,
}

/// Room visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// One-to-one conversation.
    #[default]
    Private,
    /// Group conversation. Opaque to this client beyond its id.
    Group,
}

/// Payload of `chatRoom:created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    /// Room id.
    pub id: String,
    /// Room name.
    #[serde(default)]
    pub name: String,
    /// Room visibility.
    #[serde(default, rename = "type")]
    pub kind: RoomKind,
    /// Members.
    #[serde(default)]
    pub participants: Vec<User>,
    /// Latest message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    /// Unread count for the current user.
    #[serde(default)]
    pub unread_count: u32,
}
