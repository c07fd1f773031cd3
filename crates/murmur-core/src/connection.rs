//! Connection supervision state machine.
//!
//! Owns the single transport session: the auth handshake, reconnection with
//! exponential backoff, and lifecycle notifications. Uses the action pattern:
//! methods take time as input and return [`ConnectionAction`]s for the driver
//! to execute, so the manager itself never touches a socket or a clock.
//!
//! # State Machine
//!
//! ```text
//!                connect()          Connected
//! ┌──────────────┐ ────────> ┌────────────┐ ────────> ┌───────────┐
//! │ Disconnected │           │ Connecting │           │ Connected │
//! └──────────────┘ <──┐      └────────────┘           └───────────┘
//!        ^            │        │       ^                    │
//!        │   retries  │ failure│       │ tick (deadline)    │ failure
//!        │  exhausted │        ↓       │                    ↓
//!        │            └── ┌──────────────────────┐ <────────┘
//!        │                │ Reconnecting(attempt)│
//!        └─ disconnect() ─└──────────────────────┘
//! ```
//!
//! Every session is tagged with a fresh [`SessionId`]. Signals from any
//! session other than the active one are ignored, which discards late
//! handshake completions from superseded attempts.

use std::{fmt, sync::Arc};

use murmur_proto::OutboundEvent;
use tracing::{debug, error, warn};

use crate::{
    auth::{AuthProvider, BearerToken, Identity},
    backoff::ReconnectPolicy,
    env::Environment,
    error::{AuthError, ConnectionError},
    listeners::{ListenerId, Listeners},
};

/// Identifies one transport session. Never reused within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Raw session number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session and no reconnect pending
    Disconnected,
    /// Session opened, waiting for the transport handshake
    Connecting,
    /// Handshake complete, sends allowed
    Connected,
    /// Waiting for the backoff deadline of reconnect `attempt`
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
    },
}

/// Raw lifecycle event names delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Handshake completed
    Connect,
    /// Session closed
    Disconnect,
    /// Handshake failed
    ConnectError,
    /// Transport error, or a persistent failure surfaced to observers
    Error,
}

impl LifecycleEvent {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ConnectError => "connect_error",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the transport reports about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// Handshake completed
    Connected,
    /// Handshake failed
    ConnectError {
        /// Failure description
        reason: String,
    },
    /// Session closed by the peer or the network
    Closed {
        /// Close description
        reason: String,
    },
    /// Transport error on an open session
    Error {
        /// Failure description
        reason: String,
    },
}

/// Delivered to listeners on every lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionNotice {
    /// Raw event
    pub event: LifecycleEvent,
    /// State after the event was handled
    pub state: ConnectionState,
    /// Error attached to the event, if any
    pub error: Option<ConnectionError>,
}

/// Actions returned by the connection state machine.
///
/// The driver (simulation harness or production runtime) executes these:
/// - `OpenSession`: open a transport session presenting the token
/// - `CloseSession`: tear the session down and stop reporting its events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a new transport session
    OpenSession {
        /// Tag for every signal and event the session reports
        session: SessionId,
        /// Bearer token for the handshake
        token: BearerToken,
    },

    /// Close a transport session
    CloseSession {
        /// Session to close
        session: SessionId,
    },
}

/// Outbound event queued for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// Session the event was accepted on
    pub session: SessionId,
    /// The event
    pub event: OutboundEvent,
}

/// Send surface the stores emit through.
pub trait EventSink {
    /// Queue an outbound event.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` unless the connection is ready
    fn send(&mut self, event: OutboundEvent) -> Result<(), ConnectionError>;

    /// Whether sends are currently accepted.
    fn is_ready(&self) -> bool;
}

/// Connection configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Backoff between reconnection attempts
    pub reconnect: ReconnectPolicy,
}

/// Connection supervisor.
///
/// Exactly one instance owns the session. Stores send through its
/// [`EventSink`] implementation and never see the session itself.
pub struct ConnectionManager<E: Environment> {
    env: E,
    auth: Arc<dyn AuthProvider>,
    config: ConnectionConfig,
    state: ConnectionState,
    next_session: u64,
    active: Option<SessionId>,
    /// Reconnect attempts since the last successful handshake
    attempt: u32,
    reconnect_at: Option<E::Instant>,
    /// Persistent error surfaced after giving up
    last_error: Option<ConnectionError>,
    outbox: Vec<Outbound>,
    listeners: Listeners<ConnectionNotice>,
}

impl<E: Environment> fmt::Debug for ConnectionManager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("active", &self.active)
            .field("attempt", &self.attempt)
            .field("reconnect_at", &self.reconnect_at)
            .field("last_error", &self.last_error)
            .field("outbox", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl<E: Environment> ConnectionManager<E> {
    /// Create a manager in [`ConnectionState::Disconnected`].
    pub fn new(env: E, auth: Arc<dyn AuthProvider>, config: ConnectionConfig) -> Self {
        Self {
            env,
            auth,
            config,
            state: ConnectionState::Disconnected,
            next_session: 0,
            active: None,
            attempt: 0,
            reconnect_at: None,
            last_error: None,
            outbox: Vec::new(),
            listeners: Listeners::new(),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session currently owned, if any.
    pub fn active_session(&self) -> Option<SessionId> {
        self.active
    }

    /// Reconnect attempts made since the last successful handshake.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Deadline of the pending reconnect attempt.
    pub fn next_deadline(&self) -> Option<E::Instant> {
        self.reconnect_at
    }

    /// Persistent error: retries exhausted or credentials unavailable.
    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    /// Signed-in user according to the auth provider.
    pub fn current_user(&self) -> Option<Identity> {
        self.auth.current_user()
    }

    /// Register a lifecycle listener.
    pub fn add_listener(
        &mut self,
        listener: impl FnMut(&ConnectionNotice) + Send + 'static,
    ) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Remove a lifecycle listener.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Start a connection.
    ///
    /// No-op while `Connecting` or `Connected`. Otherwise resets the attempt
    /// counter, cancels any pending reconnect and opens a fresh session.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::Auth` if no usable token is available; no session
    ///   is opened
    pub fn connect(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            debug!(state = ?self.state, "connect ignored, session already in progress");
            return Ok(vec![]);
        }

        self.attempt = 0;
        self.reconnect_at = None;
        self.last_error = None;

        match self.fetch_token() {
            Ok(token) => Ok(self.open_session(token)),
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                let err = ConnectionError::from(err);
                self.last_error = Some(err.clone());
                Err(err)
            },
        }
    }

    /// Apply a transport signal for `session`.
    ///
    /// Signals from any session but the active one are stale. A stale
    /// `Connected` gets its session closed so the late socket does not leak.
    pub fn handle_signal(
        &mut self,
        session: SessionId,
        signal: TransportSignal,
        now: E::Instant,
    ) -> Vec<ConnectionAction> {
        if self.active != Some(session) {
            debug!(%session, ?signal, "ignoring signal from superseded session");
            return match signal {
                TransportSignal::Connected => vec![ConnectionAction::CloseSession { session }],
                _ => vec![],
            };
        }

        match signal {
            TransportSignal::Connected => {
                if self.state != ConnectionState::Connecting {
                    return vec![];
                }

                debug!(%session, attempt = self.attempt, "connected");
                self.state = ConnectionState::Connected;
                self.attempt = 0;
                self.last_error = None;
                self.notify(LifecycleEvent::Connect, None);
                vec![]
            },
            TransportSignal::ConnectError { reason } => {
                self.fail(session, LifecycleEvent::ConnectError, reason, now)
            },
            TransportSignal::Closed { reason } => {
                self.fail(session, LifecycleEvent::Disconnect, reason, now)
            },
            TransportSignal::Error { reason } => {
                self.fail(session, LifecycleEvent::Error, reason, now)
            },
        }
    }

    /// Process time-based events: fires a due reconnect attempt.
    ///
    /// Each attempt fetches a fresh token. A missing or expired token at this
    /// point is fatal: the manager stops retrying and surfaces the error.
    pub fn tick(&mut self, now: E::Instant) -> Vec<ConnectionAction> {
        let Some(deadline) = self.reconnect_at else {
            return vec![];
        };
        if now < deadline {
            return vec![];
        }
        self.reconnect_at = None;

        let ConnectionState::Reconnecting { attempt } = self.state else {
            return vec![];
        };

        match self.fetch_token() {
            Ok(token) => {
                debug!(attempt, "reconnect attempt");
                self.open_session(token)
            },
            Err(err) => {
                warn!(attempt, %err, "reconnect aborted, credentials unavailable");
                let err = ConnectionError::from(err);
                self.state = ConnectionState::Disconnected;
                self.last_error = Some(err.clone());
                self.notify(LifecycleEvent::Error, Some(err));
                vec![]
            },
        }
    }

    /// Tear down the session and cancel any pending reconnect.
    ///
    /// Safe from any state and idempotent. Queued outbound events are dropped.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        let was = self.state;

        self.state = ConnectionState::Disconnected;
        self.reconnect_at = None;
        self.attempt = 0;
        self.outbox.clear();

        let actions = self
            .active
            .take()
            .map(|session| vec![ConnectionAction::CloseSession { session }])
            .unwrap_or_default();

        if was != ConnectionState::Disconnected {
            debug!(?was, "disconnected");
            self.notify(LifecycleEvent::Disconnect, None);
        }

        actions
    }

    /// Drain events accepted by [`EventSink::send`] since the last call.
    pub fn take_outgoing(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn fetch_token(&self) -> Result<BearerToken, AuthError> {
        let token = self.auth.bearer_token().ok_or(AuthError::MissingToken)?;
        if token.is_expired(self.env.wall_clock_ms()) {
            return Err(AuthError::ExpiredToken);
        }
        Ok(token)
    }

    fn open_session(&mut self, token: BearerToken) -> Vec<ConnectionAction> {
        self.next_session += 1;
        let session = SessionId(self.next_session);

        self.active = Some(session);
        self.state = ConnectionState::Connecting;
        debug!(%session, "opening session");

        vec![ConnectionAction::OpenSession { session, token }]
    }

    fn fail(
        &mut self,
        session: SessionId,
        event: LifecycleEvent,
        reason: String,
        now: E::Instant,
    ) -> Vec<ConnectionAction> {
        self.active = None;
        self.outbox.clear();

        let cause = ConnectionError::Transport { reason };
        let next = self.attempt + 1;

        let exhausted = match self.config.reconnect.delay_for(next) {
            Some(delay) => {
                debug!(%session, attempt = next, ?delay, %cause, "scheduling reconnect");
                self.attempt = next;
                self.state = ConnectionState::Reconnecting { attempt: next };
                self.reconnect_at = Some(now + delay);
                None
            },
            None => {
                let exhausted = ConnectionError::RetriesExhausted { attempts: self.attempt };
                error!(%session, %cause, "giving up on connection");
                self.state = ConnectionState::Disconnected;
                self.reconnect_at = None;
                self.last_error = Some(exhausted.clone());
                Some(exhausted)
            },
        };

        self.notify(event, Some(cause));
        if let Some(exhausted) = exhausted {
            self.notify(LifecycleEvent::Error, Some(exhausted));
        }

        vec![ConnectionAction::CloseSession { session }]
    }

    fn notify(&mut self, event: LifecycleEvent, error: Option<ConnectionError>) {
        let notice = ConnectionNotice { event, state: self.state, error };
        self.listeners.notify(&notice);
    }
}

impl<E: Environment> EventSink for ConnectionManager<E> {
    fn send(&mut self, event: OutboundEvent) -> Result<(), ConnectionError> {
        match (self.state, self.active) {
            (ConnectionState::Connected, Some(session)) => {
                self.outbox.push(Outbound { session, event });
                Ok(())
            },
            (state, _) => Err(ConnectionError::NotConnected { state }),
        }
    }

    fn is_ready(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    use super::*;
    use crate::{SystemEnv, auth::StaticAuth};

    fn manager() -> ConnectionManager<SystemEnv> {
        let auth = StaticAuth::new(Identity::new("alice", "Alice"), BearerToken::new("token"));
        ConnectionManager::new(SystemEnv::new(), Arc::new(auth), ConnectionConfig::default())
    }

    fn opened(actions: &[ConnectionAction]) -> SessionId {
        match actions {
            [ConnectionAction::OpenSession { session, .. }] => *session,
            other => unreachable!("expected one OpenSession, got {other:?}"),
        }
    }

    fn closed() -> TransportSignal {
        TransportSignal::Closed { reason: "reset".into() }
    }

    #[test]
    fn connect_opens_one_session() {
        let mut conn = manager();
        let session = opened(&conn.connect().unwrap());

        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert!(conn.connect().unwrap().is_empty());

        conn.handle_signal(session, TransportSignal::Connected, Instant::now());
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(conn.connect().unwrap().is_empty());
    }

    #[test]
    fn connect_without_token_fails_before_opening() {
        let mut conn = ConnectionManager::new(
            SystemEnv::new(),
            Arc::new(StaticAuth::anonymous()),
            ConnectionConfig::default(),
        );

        let err = conn.connect().unwrap_err();
        assert_eq!(err, ConnectionError::Auth(AuthError::MissingToken));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.active_session(), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = StaticAuth::new(
            Identity::new("alice", "Alice"),
            BearerToken::new("token").expiring_at(1),
        );
        let mut conn =
            ConnectionManager::new(SystemEnv::new(), Arc::new(auth), ConnectionConfig::default());

        assert_eq!(conn.connect().unwrap_err(), ConnectionError::Auth(AuthError::ExpiredToken));
    }

    #[test]
    fn send_requires_connected() {
        let mut conn = manager();
        let event = OutboundEvent::MarkRead { message_id: "m1".into() };

        let err = conn.send(event.clone()).unwrap_err();
        assert_eq!(err, ConnectionError::NotConnected { state: ConnectionState::Disconnected });

        let session = opened(&conn.connect().unwrap());
        assert!(conn.send(event.clone()).is_err());

        conn.handle_signal(session, TransportSignal::Connected, Instant::now());
        conn.send(event.clone()).unwrap();

        assert_eq!(conn.take_outgoing(), vec![Outbound { session, event }]);
        assert!(conn.take_outgoing().is_empty());
    }

    #[test]
    fn close_schedules_backoff() {
        let mut conn = manager();
        let t0 = Instant::now();
        let session = opened(&conn.connect().unwrap());
        conn.handle_signal(session, TransportSignal::Connected, t0);

        let actions = conn.handle_signal(session, closed(), t0);
        assert_eq!(actions, vec![ConnectionAction::CloseSession { session }]);
        assert_eq!(conn.state(), ConnectionState::Reconnecting { attempt: 1 });
        assert_eq!(conn.next_deadline(), Some(t0 + Duration::from_millis(1000)));

        assert!(conn.tick(t0 + Duration::from_millis(999)).is_empty());
        let retry = opened(&conn.tick(t0 + Duration::from_millis(1000)));
        assert_ne!(retry, session);
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn sixth_failure_is_terminal() {
        let mut conn = manager();
        let mut now = Instant::now();
        let mut session = opened(&conn.connect().unwrap());

        for attempt in 1..=5u32 {
            conn.handle_signal(session, TransportSignal::ConnectError { reason: "refused".into() }, now);
            assert_eq!(conn.state(), ConnectionState::Reconnecting { attempt });
            now = conn.next_deadline().unwrap();
            session = opened(&conn.tick(now));
        }

        conn.handle_signal(session, TransportSignal::ConnectError { reason: "refused".into() }, now);

        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.last_error(), Some(&ConnectionError::RetriesExhausted { attempts: 5 }));
        assert_eq!(conn.next_deadline(), None);
        assert!(conn.tick(now + Duration::from_secs(3600)).is_empty());

        // An explicit connect starts over.
        opened(&conn.connect().unwrap());
        assert_eq!(conn.attempt(), 0);
        assert_eq!(conn.last_error(), None);
    }

    #[test]
    fn successful_handshake_resets_attempts() {
        let mut conn = manager();
        let t0 = Instant::now();
        let session = opened(&conn.connect().unwrap());
        conn.handle_signal(session, closed(), t0);

        let retry = opened(&conn.tick(t0 + Duration::from_secs(1)));
        conn.handle_signal(retry, TransportSignal::Connected, t0 + Duration::from_secs(1));

        assert_eq!(conn.attempt(), 0);
        conn.handle_signal(retry, closed(), t0 + Duration::from_secs(2));
        assert_eq!(conn.state(), ConnectionState::Reconnecting { attempt: 1 });
    }

    #[test]
    fn disconnect_cancels_pending_reconnect() {
        let mut conn = manager();
        let t0 = Instant::now();
        let session = opened(&conn.connect().unwrap());
        conn.handle_signal(session, closed(), t0);

        assert!(conn.disconnect().is_empty());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.tick(t0 + Duration::from_secs(60)).is_empty());
        assert!(conn.disconnect().is_empty());
    }

    #[test]
    fn late_handshake_from_superseded_session_is_closed() {
        let mut conn = manager();
        let t0 = Instant::now();
        let first = opened(&conn.connect().unwrap());

        assert_eq!(conn.disconnect(), vec![ConnectionAction::CloseSession { session: first }]);
        let second = opened(&conn.connect().unwrap());

        let actions = conn.handle_signal(first, TransportSignal::Connected, t0);
        assert_eq!(actions, vec![ConnectionAction::CloseSession { session: first }]);
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(conn.active_session(), Some(second));
    }

    #[test]
    fn listeners_see_raw_event_names() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut conn = manager();
        let sink = Arc::clone(&seen);
        conn.add_listener(move |notice| sink.lock().unwrap().push(notice.event.as_str()));

        let t0 = Instant::now();
        let session = opened(&conn.connect().unwrap());
        conn.handle_signal(session, TransportSignal::Connected, t0);
        conn.handle_signal(session, TransportSignal::Error { reason: "boom".into() }, t0);
        let retry = opened(&conn.tick(t0 + Duration::from_secs(1)));
        conn.handle_signal(retry, TransportSignal::ConnectError { reason: "refused".into() }, t0);
        conn.disconnect();

        assert_eq!(*seen.lock().unwrap(), vec!["connect", "error", "connect_error", "disconnect"]);
    }
}
