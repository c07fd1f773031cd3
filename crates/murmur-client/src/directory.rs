//! Contact directory and known rooms.
//!
//! Filled from `users:received`, which splits users into contacts with an
//! existing conversation and everyone else, and from `chatRoom:created`,
//! which promotes the peer of a new private room to a contact.

use std::sync::Arc;

use murmur_core::{ListenerId, UserId};
use murmur_proto::{ChatRoom, ConnectedUser, Message, RoomKind, User, UserDirectory};

use crate::store::Store;

/// Directory snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryState {
    /// Users split by conversation status.
    pub users: UserDirectory,
    /// Rooms announced by the server, in arrival order.
    pub rooms: Vec<ChatRoom>,
}

impl DirectoryState {
    /// Contact entry for `user_id`.
    pub fn contact(&self, user_id: &str) -> Option<&ConnectedUser> {
        self.users.connected_users.iter().find(|c| c.user.id == user_id)
    }

    /// Contact whose conversation lives in `room_id`.
    pub fn contact_in_room(&self, room_id: &str) -> Option<&ConnectedUser> {
        self.users.connected_users.iter().find(|c| c.chat_room_id == room_id)
    }

    /// Room with `room_id`.
    pub fn room(&self, room_id: &str) -> Option<&ChatRoom> {
        self.rooms.iter().find(|r| r.id == room_id)
    }
}

/// Owns the directory.
#[derive(Debug, Default)]
pub struct Directory {
    state: Store<DirectoryState>,
}

impl Directory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current directory.
    pub fn state(&self) -> &DirectoryState {
        self.state.get()
    }

    /// Shared snapshot.
    pub fn snapshot(&self) -> Arc<DirectoryState> {
        self.state.snapshot()
    }

    /// Subscribe to directory changes.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Arc<DirectoryState>) + Send + 'static,
    ) -> ListenerId {
        self.state.subscribe(listener)
    }

    /// Replace the user lists with a fresh `users:received` payload.
    pub fn set_users(&mut self, users: UserDirectory) {
        self.state.update(|state| {
            state.users = users;
            true
        });
    }

    /// Add or replace a contact, removing it from the non-contacts.
    pub fn upsert_contact(&mut self, contact: ConnectedUser) {
        self.state.update(|state| {
            let users = &mut state.users;
            users.non_connected_users.retain(|u| u.id != contact.user.id);
            match users.connected_users.iter_mut().find(|c| c.user.id == contact.user.id) {
                Some(existing) => *existing = contact,
                None => users.connected_users.push(contact),
            }
            true
        });
    }

    /// Drop a contact. Returns whether it existed.
    pub fn remove_contact(&mut self, user_id: &str) -> bool {
        self.state.update(|state| {
            let before = state.users.connected_users.len();
            state.users.connected_users.retain(|c| c.user.id != user_id);
            state.users.connected_users.len() != before
        })
    }

    /// Set the unread count of a contact. Returns whether it changed.
    pub fn set_unread(&mut self, user_id: &str, count: u32) -> bool {
        self.state.update(|state| {
            match state.users.connected_users.iter_mut().find(|c| c.user.id == user_id) {
                Some(contact) if contact.unread_count != count => {
                    contact.unread_count = count;
                    true
                },
                _ => false,
            }
        })
    }

    /// Account a message from someone other than `me` to its sender's
    /// contact: bump unread and update the preview.
    pub fn note_incoming(&mut self, message: &Message, me: Option<&str>) -> bool {
        if me == Some(message.sender_id.as_str()) {
            return false;
        }

        self.state.update(|state| {
            match state.users.connected_users.iter_mut().find(|c| c.user.id == message.sender_id) {
                Some(contact) => {
                    contact.unread_count = contact.unread_count.saturating_add(1);
                    contact.last_message.clone_from(&message.text);
                    true
                },
                None => false,
            }
        })
    }

    /// Record a room from `chatRoom:created`.
    ///
    /// For a private room the peer (the participant who is not `me`) becomes
    /// a contact bound to the room.
    pub fn add_room(&mut self, room: ChatRoom, me: Option<&str>) {
        let peer: Option<User> = match room.kind {
            RoomKind::Private => room.participants.iter().find(|p| Some(p.id.as_str()) != me).cloned(),
            RoomKind::Group => None,
        };

        if let Some(user) = peer {
            let existing = self.state.get().contact(&user.id).cloned();
            let contact = ConnectedUser {
                user,
                unread_count: room.unread_count,
                chat_room_id: room.id.clone(),
                last_message: room
                    .last_message
                    .as_ref()
                    .map(|m| m.text.clone())
                    .or(existing.map(|c| c.last_message))
                    .unwrap_or_default(),
            };
            self.upsert_contact(contact);
        }

        self.state.update(|state| {
            match state.rooms.iter_mut().find(|r| r.id == room.id) {
                Some(existing) => *existing = room,
                None => state.rooms.push(room),
            }
            true
        });
    }

    /// Contact ids in directory order.
    pub fn contact_ids(&self) -> Vec<UserId> {
        self.state.get().users.connected_users.iter().map(|c| c.user.id.clone()).collect()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        if *self.state.get() != DirectoryState::default() {
            self.state.replace(DirectoryState::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User { id: id.into(), name: id.to_uppercase(), email: None, avatar: None, last_seen: None }
    }

    fn contact(id: &str, room: &str) -> ConnectedUser {
        ConnectedUser {
            user: user(id),
            unread_count: 0,
            chat_room_id: room.into(),
            last_message: String::new(),
        }
    }

    fn incoming(sender: &str, text: &str) -> Message {
        Message {
            id: format!("m-{text}"),
            text: text.into(),
            sender_id: sender.into(),
            sender_name: None,
            chat_room_id: Some("r-bob".into()),
            timestamp: 0,
            message_type: murmur_proto::MessageType::Text,
            is_read: false,
            client_id: None,
        }
    }

    #[test]
    fn incoming_messages_bump_unread() {
        let mut directory = Directory::new();
        directory.set_users(UserDirectory {
            connected_users: vec![contact("bob", "r-bob")],
            non_connected_users: vec![user("carol")],
        });

        assert!(directory.note_incoming(&incoming("bob", "hey"), Some("alice")));
        assert!(!directory.note_incoming(&incoming("alice", "mine"), Some("alice")));

        let bob = directory.state().contact("bob").unwrap();
        assert_eq!(bob.unread_count, 1);
        assert_eq!(bob.last_message, "hey");

        assert!(directory.set_unread("bob", 0));
        assert!(!directory.set_unread("bob", 0));
    }

    #[test]
    fn unread_count_saturates() {
        let mut directory = Directory::new();
        let mut bob = contact("bob", "r-bob");
        bob.unread_count = u32::MAX;
        directory.set_users(UserDirectory { connected_users: vec![bob], non_connected_users: vec![] });

        assert!(directory.note_incoming(&incoming("bob", "again"), Some("alice")));
        assert_eq!(directory.state().contact("bob").unwrap().unread_count, u32::MAX);
    }

    #[test]
    fn private_room_promotes_peer() {
        let mut directory = Directory::new();
        directory.set_users(UserDirectory {
            connected_users: vec![],
            non_connected_users: vec![user("carol")],
        });

        directory.add_room(
            ChatRoom {
                id: "r-carol".into(),
                name: String::new(),
                kind: RoomKind::Private,
                participants: vec![user("alice"), user("carol")],
                last_message: None,
                unread_count: 0,
            },
            Some("alice"),
        );

        let state = directory.state();
        assert!(state.users.non_connected_users.is_empty());
        assert_eq!(state.contact_in_room("r-carol").unwrap().user.id, "carol");
        assert!(state.room("r-carol").is_some());
        assert_eq!(directory.contact_ids(), vec!["carol"]);
    }
}
