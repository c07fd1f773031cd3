//! Client composition root.
//!
//! `ChatClient` owns the connection manager, the router and every store, and
//! wires them together: intents go out through the connection, inbound
//! events come back through the router, and connection lifecycle changes
//! rebind the router and re-join rooms.

use std::{collections::BTreeSet, sync::Arc};

use murmur_core::{
    AuthError, AuthProvider, ConnectionAction, ConnectionConfig, ConnectionError,
    ConnectionManager, ConnectionNotice, ConnectionState, Environment, EventSink, Identity,
    ListenerId, SessionId, TransportSignal,
};
use murmur_proto::{Message, OutboundEvent};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    directory::Directory,
    error::ClientError,
    event::{ClientAction, ClientEvent},
    message_store::{MessageDraft, MessageStore},
    presence::PresenceTracker,
    router::{EventRouter, RouterTargets},
    typing::{TypingConfig, TypingCoordinator},
};

/// Client configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Reconnection policy
    pub connection: ConnectionConfig,
    /// Typing timeouts
    pub typing: TypingConfig,
}

/// Realtime chat client.
pub struct ChatClient<E: Environment> {
    env: E,
    auth: Arc<dyn AuthProvider>,
    conn: ConnectionManager<E>,
    router: EventRouter,
    messages: MessageStore,
    typing: TypingCoordinator<E::Instant>,
    presence: PresenceTracker,
    directory: Directory,
    /// Rooms re-joined on every successful handshake
    joined_rooms: BTreeSet<String>,
    actions: Vec<ClientAction>,
}

impl<E: Environment> std::fmt::Debug for ChatClient<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("conn", &self.conn)
            .field("router", &self.router)
            .field("joined_rooms", &self.joined_rooms)
            .field("pending_actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}

impl<E: Environment> ChatClient<E> {
    /// Create a disconnected client for the user behind `auth`.
    pub fn new(env: E, auth: Arc<dyn AuthProvider>, config: ClientConfig) -> Self {
        Self {
            conn: ConnectionManager::new(env.clone(), Arc::clone(&auth), config.connection),
            messages: MessageStore::new(Arc::clone(&auth)),
            typing: TypingCoordinator::new(Arc::clone(&auth), config.typing),
            router: EventRouter::new(),
            presence: PresenceTracker::new(),
            directory: Directory::new(),
            joined_rooms: BTreeSet::new(),
            actions: Vec::new(),
            env,
            auth,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    /// Signed-in user.
    pub fn identity(&self) -> Option<Identity> {
        self.auth.current_user()
    }

    /// Connection manager.
    pub fn connection(&self) -> &ConnectionManager<E> {
        &self.conn
    }

    /// Inbound router.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Message log owner.
    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    /// Mutable message store, for subscriptions.
    pub fn messages_mut(&mut self) -> &mut MessageStore {
        &mut self.messages
    }

    /// Typing state.
    pub fn typing(&self) -> &TypingCoordinator<E::Instant> {
        &self.typing
    }

    /// Mutable typing state, for subscriptions.
    pub fn typing_mut(&mut self) -> &mut TypingCoordinator<E::Instant> {
        &mut self.typing
    }

    /// Online set.
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Mutable online set, for subscriptions.
    pub fn presence_mut(&mut self) -> &mut PresenceTracker {
        &mut self.presence
    }

    /// Contacts and rooms.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Mutable directory, for subscriptions.
    pub fn directory_mut(&mut self) -> &mut Directory {
        &mut self.directory
    }

    /// Rooms currently joined.
    pub fn joined_rooms(&self) -> impl Iterator<Item = &str> {
        self.joined_rooms.iter().map(String::as_str)
    }

    /// Register a connection lifecycle listener.
    pub fn add_connection_listener(
        &mut self,
        listener: impl FnMut(&ConnectionNotice) + Send + 'static,
    ) -> ListenerId {
        self.conn.add_listener(listener)
    }

    /// Remove a connection lifecycle listener.
    pub fn remove_connection_listener(&mut self, id: ListenerId) -> bool {
        self.conn.remove_listener(id)
    }

    /// Earliest deadline the driver should tick at.
    pub fn next_deadline(&self) -> Option<E::Instant> {
        match (self.conn.next_deadline(), self.typing.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Drain actions produced since the last call.
    pub fn take_actions(&mut self) -> Vec<ClientAction> {
        std::mem::take(&mut self.actions)
    }

    /// Start connecting. No-op while a session is in progress.
    ///
    /// # Errors
    ///
    /// - `AuthError` if no usable token is available
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let actions = self.conn.connect()?;
        self.push(actions);
        Ok(())
    }

    /// Close the session and cancel any pending reconnect. Idempotent.
    pub fn disconnect(&mut self) {
        let actions = self.conn.disconnect();
        self.push(actions);
        self.left_connected();
    }

    /// Disconnect and forget all per-user state.
    pub fn logout(&mut self) {
        self.disconnect();
        self.joined_rooms.clear();
        self.messages.clear();
        self.typing.clear();
        self.presence.clear();
        self.directory.clear();
    }

    /// Process a driver event.
    ///
    /// # Errors
    ///
    /// - `ClientError::Protocol` for an inbound event that failed
    ///   validation; it was logged and dropped, and no state changed
    pub fn handle(&mut self, event: ClientEvent<E::Instant>) -> Result<(), ClientError> {
        match event {
            ClientEvent::Transport { session, signal } => {
                self.handle_signal(session, signal);
                Ok(())
            },
            ClientEvent::Inbound { session, name, payload } => {
                self.handle_inbound(session, &name, payload)
            },
            ClientEvent::Tick { now } => {
                self.handle_tick(now);
                Ok(())
            },
        }
    }

    /// Send a message, appending its optimistic copy.
    ///
    /// Ends the local typing burst.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` when disconnected; nothing appended
    /// - `AuthError::MissingIdentity` when logged out
    pub fn send_message(&mut self, draft: MessageDraft) -> Result<Message, ClientError> {
        let now_ms = self.env.wall_clock_ms();
        let message = self.messages.send_message(draft, &mut self.conn, now_ms)?;

        if self.typing.is_local_active()
            && let Err(err) = self.typing.stop_typing(&mut self.conn)
        {
            debug!(%err, "typing stop after send not delivered");
        }

        self.flush();
        Ok(message)
    }

    /// Mark `message_id` read on the server and locally.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` when disconnected
    pub fn mark_read(&mut self, message_id: &str) -> Result<bool, ClientError> {
        let changed = self.messages.request_mark_read(message_id, &mut self.conn)?;
        self.flush();
        Ok(changed)
    }

    /// Join `room_id`; it is re-joined after every reconnect.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` when disconnected; the room is not
    ///   remembered
    pub fn join_room(&mut self, room_id: &str) -> Result<(), ClientError> {
        self.emit(OutboundEvent::JoinRoom { chat_room_id: room_id.to_owned() })?;
        self.joined_rooms.insert(room_id.to_owned());
        Ok(())
    }

    /// Leave `room_id`. The room is forgotten even if the send fails.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` when disconnected
    pub fn leave_room(&mut self, room_id: &str) -> Result<(), ClientError> {
        self.joined_rooms.remove(room_id);
        self.emit(OutboundEvent::LeaveRoom { chat_room_id: room_id.to_owned() })
    }

    /// Note a local keystroke.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` when disconnected
    pub fn start_typing(&mut self) -> Result<bool, ClientError> {
        let now = self.env.now();
        let emitted = self.typing.start_typing(&mut self.conn, now)?;
        self.flush();
        Ok(emitted)
    }

    /// End the local typing burst.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` when disconnected
    pub fn stop_typing(&mut self) -> Result<(), ClientError> {
        let result = self.typing.stop_typing(&mut self.conn);
        self.flush();
        result
    }

    /// Ask the server for the user directory (`users:get`).
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingIdentity` when logged out
    /// - `ConnectionError::NotConnected` when disconnected
    pub fn fetch_users(&mut self) -> Result<(), ClientError> {
        let me = self.auth.current_user().ok_or(AuthError::MissingIdentity)?;
        self.emit(OutboundEvent::FetchUsers { user_id: me.id })
    }

    /// Ask the server for the private room shared with `user_id`.
    ///
    /// The room arrives as `chatRoom:created`.
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingIdentity` when logged out
    /// - `ConnectionError::NotConnected` when disconnected
    pub fn open_chat_with(&mut self, user_id: &str) -> Result<(), ClientError> {
        let me = self.auth.current_user().ok_or(AuthError::MissingIdentity)?;
        self.emit(OutboundEvent::GetOrCreateChatRoom {
            current_user_id: me.id,
            with_user_id: user_id.to_owned(),
        })
    }

    /// Empty the message log and the typing state tied to it.
    pub fn clear_conversation(&mut self) {
        self.messages.clear();
        self.typing.clear();
    }

    fn handle_signal(&mut self, session: SessionId, signal: TransportSignal) {
        let before = self.conn.state();
        let actions = self.conn.handle_signal(session, signal, self.env.now());
        self.push(actions);
        self.sync_lifecycle(before);
    }

    fn handle_inbound(
        &mut self,
        session: SessionId,
        name: &str,
        payload: Value,
    ) -> Result<(), ClientError> {
        let me = self.auth.current_user().map(|identity| identity.id);
        let mut targets = RouterTargets {
            me: me.as_deref(),
            messages: &mut self.messages,
            typing: &mut self.typing,
            presence: &mut self.presence,
            directory: &mut self.directory,
        };

        match self.router.route(session, name, payload, &mut targets, self.env.now()) {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(%session, event = name, %err, "dropping malformed inbound event");
                Err(err.into())
            },
        }
    }

    fn handle_tick(&mut self, now: E::Instant) {
        let before = self.conn.state();
        let actions = self.conn.tick(now);
        self.push(actions);
        self.sync_lifecycle(before);

        self.typing.tick(&mut self.conn, now);
        self.flush();
    }

    /// Rebind or unbind the router when the connection crosses `Connected`.
    fn sync_lifecycle(&mut self, before: ConnectionState) {
        let after = self.conn.state();
        let was = before == ConnectionState::Connected;
        let is = after == ConnectionState::Connected;

        if is && !was {
            self.entered_connected();
        } else if was && !is {
            self.left_connected();
        }
    }

    fn entered_connected(&mut self) {
        let Some(session) = self.conn.active_session() else {
            return;
        };
        self.router.install(session);

        let rooms: Vec<String> = self.joined_rooms.iter().cloned().collect();
        for chat_room_id in rooms {
            debug!(%session, room = %chat_room_id, "re-joining room");
            if let Err(err) = self.conn.send(OutboundEvent::JoinRoom { chat_room_id }) {
                warn!(%err, "room re-join refused");
            }
        }
        self.flush();
    }

    /// No `typing:stop` can arrive for a dead session, so remote entries go
    /// now rather than at expiry.
    fn left_connected(&mut self) {
        self.router.uninstall();
        self.typing.clear();
    }

    fn emit(&mut self, event: OutboundEvent) -> Result<(), ClientError> {
        self.conn.send(event).map_err(|err: ConnectionError| {
            debug!(%err, "outbound event refused");
            ClientError::from(err)
        })?;
        self.flush();
        Ok(())
    }

    fn push(&mut self, actions: Vec<ConnectionAction>) {
        self.actions.extend(actions.into_iter().map(ClientAction::from));
        self.flush();
    }

    fn flush(&mut self) {
        self.actions.extend(self.conn.take_outgoing().into_iter().map(ClientAction::Emit));
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use murmur_core::{BearerToken, Outbound, StaticAuth, SystemEnv};
    use serde_json::json;

    use super::*;

    fn client() -> ChatClient<SystemEnv> {
        let auth = StaticAuth::new(Identity::new("alice", "Alice"), BearerToken::new("t"));
        ChatClient::new(SystemEnv::new(), Arc::new(auth), ClientConfig::default())
    }

    fn connected() -> (ChatClient<SystemEnv>, SessionId) {
        let mut client = client();
        client.connect().unwrap();
        let session = opened(&client.take_actions());
        client.handle(ClientEvent::Transport { session, signal: TransportSignal::Connected }).unwrap();
        (client, session)
    }

    fn opened(actions: &[ClientAction]) -> SessionId {
        actions
            .iter()
            .find_map(|a| match a {
                ClientAction::OpenSession { session, .. } => Some(*session),
                _ => None,
            })
            .unwrap()
    }

    fn emitted(actions: &[ClientAction]) -> Vec<&'static str> {
        actions
            .iter()
            .filter_map(|a| match a {
                ClientAction::Emit(Outbound { event, .. }) => Some(event.name()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn send_while_disconnected_fails_visibly() {
        let mut client = client();

        let err = client.send_message(MessageDraft::text("r", "hi")).unwrap_err();

        assert!(err.is_not_connected());
        assert!(client.messages().log().is_empty());
        assert!(client.take_actions().is_empty());
    }

    #[test]
    fn send_emits_and_stops_typing() {
        let (mut client, _) = connected();
        client.start_typing().unwrap();
        client.take_actions();

        client.send_message(MessageDraft::text("r", "hi")).unwrap();

        assert_eq!(emitted(&client.take_actions()), vec!["message:send", "user:typing:stop"]);
        assert!(!client.typing().is_local_active());
    }

    #[test]
    fn reconnect_rebinds_router_and_rejoins_rooms() {
        let (mut client, first) = connected();
        client.join_room("r1").unwrap();
        client.take_actions();

        let t0 = Instant::now();
        client
            .handle(ClientEvent::Transport {
                session: first,
                signal: TransportSignal::Closed { reason: "drop".into() },
            })
            .unwrap();
        assert_eq!(client.router().bound(), None);

        client.handle(ClientEvent::Tick { now: t0 + Duration::from_secs(5) }).unwrap();
        let second = opened(&client.take_actions());
        client.handle(ClientEvent::Transport { session: second, signal: TransportSignal::Connected }).unwrap();

        assert_eq!(client.router().bound(), Some(second));
        assert_eq!(client.router().installs(), 2);
        assert_eq!(emitted(&client.take_actions()), vec!["room:join"]);
    }

    #[test]
    fn leaving_connected_clears_remote_typing() {
        let (mut client, session) = connected();
        client
            .handle(ClientEvent::Inbound {
                session,
                name: "typing:start".into(),
                payload: json!({"userId": "bob", "userName": "Bob"}),
            })
            .unwrap();
        assert_eq!(client.typing().typing_names(), vec!["Bob"]);

        client.disconnect();

        assert!(client.typing().typing_names().is_empty());
        assert_eq!(client.typing().next_deadline(), None);
    }

    #[test]
    fn malformed_inbound_is_reported_and_dropped() {
        let (mut client, session) = connected();

        let result = client.handle(ClientEvent::Inbound {
            session,
            name: "user:online".into(),
            payload: json!({"nope": true}),
        });

        assert!(matches!(result, Err(ClientError::Protocol(_))));
        assert_eq!(client.presence().count(), 0);
    }

    #[test]
    fn logout_clears_everything() {
        let (mut client, session) = connected();
        client.join_room("r1").unwrap();
        client
            .handle(ClientEvent::Inbound {
                session,
                name: "user:online".into(),
                payload: json!({"userId": "bob"}),
            })
            .unwrap();

        client.logout();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.presence().count(), 0);
        assert_eq!(client.joined_rooms().count(), 0);
    }

    #[test]
    fn directory_requests_need_identity() {
        let mut client =
            ChatClient::new(SystemEnv::new(), Arc::new(StaticAuth::anonymous()), ClientConfig::default());

        assert_eq!(client.fetch_users().unwrap_err(), ClientError::from(AuthError::MissingIdentity));
    }
}
