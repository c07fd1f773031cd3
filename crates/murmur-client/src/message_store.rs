//! Per-room message log with optimistic sends.
//!
//! The log is append-only in observation order: insertion order is display
//! order. Local sends are appended immediately under a temporary id and
//! replaced in place once the server echoes them back with the same
//! `clientId`.
//!
//! # Invariants
//!
//! - Message ids in the log are unique
//! - A failed send leaves the log unchanged
//! - Entries never move; reconciliation and read flags rewrite in place

use std::sync::Arc;

use murmur_core::{AuthError, AuthProvider, EventSink, ListenerId};
use murmur_proto::{Message, MessageType, OutboundEvent, SendMessageRequest, TEMP_ID_PREFIX};
use tracing::{debug, trace};

use crate::{error::ClientError, store::Store};

/// Something the user wants to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    /// Destination room.
    pub chat_room_id: String,
    /// Message body.
    pub text: String,
    /// Content kind.
    pub message_type: MessageType,
}

impl MessageDraft {
    /// Plain-text draft.
    pub fn text(chat_room_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_room_id: chat_room_id.into(),
            text: text.into(),
            message_type: MessageType::Text,
        }
    }
}

/// Ordered message log snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    /// All messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message with `id`.
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Whether a message with `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Messages of one room in display order.
    pub fn in_room<'a>(&'a self, room_id: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.in_room(room_id))
    }

    /// Optimistic messages not yet confirmed by the server.
    pub fn pending(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_temporary())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Confirm the pending copy named by `message.client_id`.
    ///
    /// The confirmed message takes the pending copy's slot unless another
    /// entry already holds its id, in which case the pending copy is dropped.
    /// Hands `message` back when there is no pending copy to confirm.
    fn reconcile(&mut self, message: Message) -> Result<Ingest, Message> {
        let target = message
            .client_id
            .as_deref()
            .filter(|client_id| client_id.starts_with(TEMP_ID_PREFIX))
            .and_then(|client_id| self.position(client_id));

        let Some(index) = target else {
            return Err(message);
        };

        if self.position(&message.id).is_some_and(|existing| existing != index) {
            self.messages.remove(index);
            return Ok(Ingest::Duplicate);
        }

        self.messages[index] = message;
        Ok(Ingest::Reconciled)
    }
}

/// What [`MessageStore::ingest_incoming`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Appended to the log
    Appended,
    /// Replaced the optimistic copy it confirms
    Reconciled,
    /// Id already present
    Duplicate,
    /// Own message with nothing to reconcile against
    OwnEcho,
}

/// Owns the message log.
pub struct MessageStore {
    auth: Arc<dyn AuthProvider>,
    log: Store<MessageLog>,
    last_optimistic_ms: u64,
    next_seq: u64,
    last_error: Option<ClientError>,
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("log", &self.log)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl MessageStore {
    /// Create an empty store for the user behind `auth`.
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            auth,
            log: Store::default(),
            last_optimistic_ms: 0,
            next_seq: 0,
            last_error: None,
        }
    }

    /// Current log.
    pub fn log(&self) -> &MessageLog {
        self.log.get()
    }

    /// Shared snapshot of the log.
    pub fn snapshot(&self) -> Arc<MessageLog> {
        self.log.snapshot()
    }

    /// Subscribe to log replacements.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&Arc<MessageLog>) + Send + 'static,
    ) -> ListenerId {
        self.log.subscribe(listener)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.log.unsubscribe(id)
    }

    /// Messages of one room, cloned in display order.
    pub fn messages_in_room(&self, room_id: &str) -> Vec<Message> {
        self.log.get().in_room(room_id).cloned().collect()
    }

    /// Optimistic messages still awaiting confirmation.
    pub fn pending(&self) -> Vec<Message> {
        self.log.get().pending().cloned().collect()
    }

    /// Last send failure.
    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// Forget the last send failure.
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Send `draft` and append its optimistic copy.
    ///
    /// The copy gets a temporary id, the sender's display name and a local
    /// timestamp no earlier than the previous optimistic one. The outbound
    /// `message:send` carries the temporary id as `clientId`.
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingIdentity` when logged out
    /// - `ConnectionError::NotConnected` when the sink refuses the event
    ///
    /// On error nothing is appended.
    pub fn send_message(
        &mut self,
        draft: MessageDraft,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) -> Result<Message, ClientError> {
        let result = self.try_send(draft, sink, now_ms);
        if let Err(err) = &result {
            debug!(%err, "send refused");
            self.last_error = Some(err.clone());
        }
        result
    }

    fn try_send(
        &mut self,
        draft: MessageDraft,
        sink: &mut impl EventSink,
        now_ms: u64,
    ) -> Result<Message, ClientError> {
        let me = self.auth.current_user().ok_or(AuthError::MissingIdentity)?;

        let timestamp = now_ms.max(self.last_optimistic_ms);
        let temp_id = format!("{TEMP_ID_PREFIX}{timestamp}-{}", self.next_seq + 1);

        sink.send(OutboundEvent::SendMessage(SendMessageRequest {
            text: draft.text.clone(),
            sender_id: me.id.clone(),
            chat_room_id: draft.chat_room_id.clone(),
            message_type: draft.message_type,
            sender_name: Some(me.name.clone()),
            client_id: Some(temp_id.clone()),
        }))?;

        self.next_seq += 1;
        self.last_optimistic_ms = timestamp;
        self.last_error = None;

        let message = Message {
            id: temp_id,
            text: draft.text,
            sender_id: me.id,
            sender_name: Some(me.name),
            chat_room_id: Some(draft.chat_room_id),
            timestamp,
            message_type: draft.message_type,
            is_read: false,
            client_id: None,
        };

        let appended = message.clone();
        self.log.update(move |log| {
            log.messages.push(appended);
            true
        });
        trace!(id = %message.id, "optimistic message appended");

        Ok(message)
    }

    /// Apply a `message:received` event.
    ///
    /// Messages from other users are appended unless their id is already
    /// present. An own message carrying the `clientId` of a pending
    /// optimistic copy replaces that copy in place; any other own message is
    /// ignored, since the optimistic copy already shows it.
    pub fn ingest_incoming(&mut self, message: Message) -> Ingest {
        let me = self.auth.current_user().map(|identity| identity.id);

        if me.as_deref() == Some(message.sender_id.as_str()) {
            let id = message.id.clone();
            let mut outcome = Ingest::OwnEcho;
            self.log.update(|log| match log.reconcile(message) {
                Ok(result) => {
                    outcome = result;
                    true
                },
                Err(_) => false,
            });

            match outcome {
                Ingest::OwnEcho => trace!(%id, "own echo ignored"),
                Ingest::Duplicate => trace!(%id, "confirmed copy already present, pending copy dropped"),
                Ingest::Reconciled | Ingest::Appended => debug!(%id, "optimistic message confirmed"),
            }
            return outcome;
        }

        if self.log.get().contains(&message.id) {
            trace!(id = %message.id, "duplicate message dropped");
            return Ingest::Duplicate;
        }

        self.log.update(move |log| {
            log.messages.push(message);
            true
        });
        Ingest::Appended
    }

    /// Append a history batch in array order.
    ///
    /// Ids already in the log, or repeated within the batch, are skipped. An
    /// own message whose `clientId` names a pending optimistic copy confirms
    /// that copy in place instead of being appended, which covers echoes lost
    /// to a dropped connection. Returns how many messages were appended.
    pub fn ingest_history(&mut self, messages: Vec<Message>) -> usize {
        let me = self.auth.current_user().map(|identity| identity.id);
        let mut appended = 0;
        let mut confirmed = 0;
        self.log.update(|log| {
            for message in messages {
                let message = if me.as_deref() == Some(message.sender_id.as_str()) {
                    match log.reconcile(message) {
                        Ok(_) => {
                            confirmed += 1;
                            continue;
                        },
                        Err(message) => message,
                    }
                } else {
                    message
                };

                if !log.contains(&message.id) {
                    log.messages.push(message);
                    appended += 1;
                }
            }
            appended + confirmed > 0
        });
        if confirmed > 0 {
            debug!(confirmed, "optimistic messages confirmed by history");
        }
        appended
    }

    /// Set the read flag of `message_id`. Returns whether anything changed.
    pub fn mark_read(&mut self, message_id: &str) -> bool {
        self.log.update(|log| match log.position(message_id) {
            Some(index) if !log.messages[index].is_read => {
                log.messages[index].is_read = true;
                true
            },
            _ => false,
        })
    }

    /// Tell the server `message_id` was read, then flag it locally.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` when the sink refuses the event
    pub fn request_mark_read(
        &mut self,
        message_id: &str,
        sink: &mut impl EventSink,
    ) -> Result<bool, ClientError> {
        sink.send(OutboundEvent::MarkRead { message_id: message_id.to_owned() })?;
        Ok(self.mark_read(message_id))
    }

    /// Replace the message with the same id. Returns whether it existed.
    pub fn update_message(&mut self, message: Message) -> bool {
        self.log.update(move |log| match log.position(&message.id) {
            Some(index) => {
                log.messages[index] = message;
                true
            },
            None => false,
        })
    }

    /// Remove `message_id`. Returns whether it existed.
    pub fn delete_message(&mut self, message_id: &str) -> bool {
        self.log.update(|log| match log.position(message_id) {
            Some(index) => {
                log.messages.remove(index);
                true
            },
            None => false,
        })
    }

    /// Empty the log.
    pub fn clear(&mut self) {
        self.last_error = None;
        if !self.log.get().is_empty() {
            self.log.replace(MessageLog::default());
        }
    }
}
