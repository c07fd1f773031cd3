//! Inbound event dispatch.
//!
//! The router is bound to at most one session at a time. The client binds it
//! on every successful handshake and unbinds it whenever the connection
//! leaves `Connected`, so a reconnect replaces the binding instead of
//! stacking a second set of handlers next to the first.
//!
//! Each decoded event goes to exactly one store operation:
//!
//! | Event | Target |
//! |---|---|
//! | `message:received` | [`MessageStore::ingest_incoming`] |
//! | `message:history`, `chatRoom:history` | [`MessageStore::ingest_history`] |
//! | `message:read` | [`MessageStore::mark_read`] |
//! | `typing:start` | [`TypingCoordinator::add_typing_user`] |
//! | `typing:stop` | [`TypingCoordinator::remove_typing_user`] |
//! | `user:online` | [`PresenceTracker::set_online`] |
//! | `user:offline` | [`PresenceTracker::set_offline`] |
//! | `users:received` | [`Directory::set_users`] |
//! | `chatRoom:created` | [`Directory::add_room`] |
//!
//! A message from a peer that was appended also bumps that peer's unread
//! count in the directory.

use murmur_core::{Instant, SessionId};
use murmur_proto::{InboundEvent, ProtocolError};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    directory::Directory,
    message_store::{Ingest, MessageStore},
    presence::PresenceTracker,
    typing::TypingCoordinator,
};

/// Mutable borrows of every store the router feeds.
pub struct RouterTargets<'a, I> {
    /// Current user id, if signed in
    pub me: Option<&'a str>,
    /// Message log
    pub messages: &'a mut MessageStore,
    /// Typing state
    pub typing: &'a mut TypingCoordinator<I>,
    /// Online set
    pub presence: &'a mut PresenceTracker,
    /// Contacts and rooms
    pub directory: &'a mut Directory,
}

/// Session-bound inbound dispatcher.
#[derive(Debug, Default)]
pub struct EventRouter {
    bound: Option<SessionId>,
    installs: u64,
    dropped: u64,
}

impl EventRouter {
    /// Unbound router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `session`, replacing any previous binding.
    pub fn install(&mut self, session: SessionId) {
        if let Some(previous) = self.bound.replace(session) {
            debug!(%previous, %session, "router rebound");
        }
        self.installs += 1;
    }

    /// Drop the binding. Returns whether one existed.
    pub fn uninstall(&mut self) -> bool {
        self.bound.take().is_some()
    }

    /// Session currently bound.
    pub fn bound(&self) -> Option<SessionId> {
        self.bound
    }

    /// Bindings made since creation.
    pub fn installs(&self) -> u64 {
        self.installs
    }

    /// Events dropped because their session was not bound.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Decode and dispatch one inbound event.
    ///
    /// Returns the event name on delivery, or `None` if the event came from
    /// a session other than the bound one.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` for unknown names or malformed payloads; no store is
    ///   touched
    pub fn route<I: Instant>(
        &mut self,
        session: SessionId,
        name: &str,
        payload: Value,
        targets: &mut RouterTargets<'_, I>,
        now: I,
    ) -> Result<Option<&'static str>, ProtocolError> {
        if self.bound != Some(session) {
            self.dropped += 1;
            debug!(%session, bound = ?self.bound, event = name, "dropping event from unbound session");
            return Ok(None);
        }

        let event = InboundEvent::decode(name, payload)?;
        let name = event.name();
        trace!(%session, event = name, "routing");

        match event {
            InboundEvent::MessageReceived(message) => {
                let sender = message.clone();
                if targets.messages.ingest_incoming(message) == Ingest::Appended {
                    targets.directory.note_incoming(&sender, targets.me);
                }
            },
            InboundEvent::History(messages) => {
                targets.messages.ingest_history(messages);
            },
            InboundEvent::MessageRead(receipt) => {
                targets.messages.mark_read(&receipt.message_id);
            },
            InboundEvent::TypingStarted(notice) => {
                targets.typing.add_typing_user(
                    &notice.user_id,
                    notice.user_name.as_deref(),
                    notice.chat_room_id.as_deref(),
                    now,
                );
            },
            InboundEvent::TypingStopped(notice) => {
                targets.typing.remove_typing_user(&notice.user_id);
            },
            InboundEvent::UserOnline(notice) => {
                targets.presence.set_online(&notice.user_id);
            },
            InboundEvent::UserOffline(notice) => {
                targets.presence.set_offline(&notice.user_id);
            },
            InboundEvent::UsersReceived(users) => {
                targets.directory.set_users(users);
            },
            InboundEvent::ChatRoomCreated(room) => {
                targets.directory.add_room(room, targets.me);
            },
        }

        Ok(Some(name))
    }
}
