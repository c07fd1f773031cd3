//! Simulated transport and backend driver.
//!
//! `SimDriver` plays the role the websocket runtime plays in production: it
//! executes the client's actions, tracks which sessions are open, and feeds
//! back transport signals, inbound events and ticks. Tests script the
//! backend side by calling [`SimDriver::accept`], [`SimDriver::deliver`] and
//! friends.
//!
//! When an [`InvariantRegistry`] is attached, every pump checks the client
//! and collects violations instead of panicking, so a property test can
//! report the whole trace.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use murmur_client::{
    ChatClient, ClientAction, ClientConfig, ClientError, ClientEvent, Environment, SessionId,
    TransportSignal,
};
use murmur_core::{AuthProvider, BearerToken, ConnectionError, Outbound};
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    fake_auth::FakeAuth,
    invariants::{ClientSnapshot, InvariantRegistry, Violation},
    sim_env::SimEnv,
};

/// One client wired to a scripted transport on virtual time.
pub struct SimDriver {
    env: SimEnv,
    auth: Arc<FakeAuth>,
    client: ChatClient<SimEnv>,
    max_attempts: u32,
    /// Sessions opened and not yet closed
    open: BTreeSet<SessionId>,
    /// Every `OpenSession` executed, in order
    opened: Vec<(SessionId, BearerToken)>,
    /// Every `CloseSession` executed, in order
    closed: Vec<SessionId>,
    emitted: Vec<Outbound>,
    invariants: Option<InvariantRegistry>,
    violations: Vec<Violation>,
}

impl std::fmt::Debug for SimDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDriver")
            .field("elapsed", &self.env.elapsed())
            .field("client", &self.client)
            .field("open", &self.open)
            .field("emitted", &self.emitted.len())
            .field("violations", &self.violations.len())
            .finish_non_exhaustive()
    }
}

impl SimDriver {
    /// Driver for `auth`'s user with the default configuration.
    pub fn new(auth: Arc<FakeAuth>) -> Self {
        Self::with_config(auth, ClientConfig::default())
    }

    /// Driver with an explicit client configuration.
    pub fn with_config(auth: Arc<FakeAuth>, config: ClientConfig) -> Self {
        let env = SimEnv::new();
        let provider: Arc<dyn AuthProvider> = auth.clone();
        let client = ChatClient::new(env.clone(), provider, config);

        Self {
            env,
            auth,
            client,
            max_attempts: config.connection.reconnect.max_attempts,
            open: BTreeSet::new(),
            opened: Vec::new(),
            closed: Vec::new(),
            emitted: Vec::new(),
            invariants: None,
            violations: Vec::new(),
        }
    }

    /// Check `registry` after every step.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// The client under test.
    pub fn client(&self) -> &ChatClient<SimEnv> {
        &self.client
    }

    /// Mutable client. Call [`SimDriver::pump`] after driving it directly.
    pub fn client_mut(&mut self) -> &mut ChatClient<SimEnv> {
        &mut self.client
    }

    /// Shared virtual clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Scriptable auth behind the client.
    pub fn auth(&self) -> &FakeAuth {
        &self.auth
    }

    /// Observable state right now.
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot::capture(&self.client, self.max_attempts)
    }

    /// Start connecting.
    ///
    /// # Errors
    ///
    /// - Whatever [`ChatClient::connect`] refuses with
    pub fn connect(&mut self) -> Result<(), ClientError> {
        let result = self.client.connect();
        self.pump();
        result
    }

    /// Execute every pending client action, then check invariants.
    pub fn pump(&mut self) {
        for action in self.client.take_actions() {
            match action {
                ClientAction::OpenSession { session, token } => {
                    trace!(%session, "sim open");
                    self.open.insert(session);
                    self.opened.push((session, token));
                },
                ClientAction::CloseSession { session } => {
                    trace!(%session, "sim close");
                    self.open.remove(&session);
                    self.closed.push(session);
                },
                ClientAction::Emit(outbound) => {
                    trace!(session = %outbound.session, event = outbound.event.name(), "sim emit");
                    self.emitted.push(outbound);
                },
            }
        }

        self.check_invariants();
    }

    /// Most recently opened session.
    pub fn latest_session(&self) -> Option<SessionId> {
        self.opened.last().map(|(session, _)| *session)
    }

    /// Tokens presented by each opened session, in order.
    pub fn presented_tokens(&self) -> Vec<&str> {
        self.opened.iter().map(|(_, token)| token.as_str()).collect()
    }

    /// Sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.opened.len()
    }

    /// Sessions closed so far, in order.
    pub fn closed_sessions(&self) -> &[SessionId] {
        &self.closed
    }

    /// Whether `session` is open on the simulated transport.
    pub fn is_open(&self, session: SessionId) -> bool {
        self.open.contains(&session)
    }

    /// Complete the handshake of `session`.
    pub fn accept(&mut self, session: SessionId) {
        self.signal(session, TransportSignal::Connected);
    }

    /// Complete the handshake of the latest session.
    pub fn accept_latest(&mut self) -> Option<SessionId> {
        let session = self.latest_session()?;
        self.accept(session);
        Some(session)
    }

    /// Fail the handshake of `session`.
    pub fn refuse(&mut self, session: SessionId, reason: &str) {
        self.signal(session, TransportSignal::ConnectError { reason: reason.to_owned() });
    }

    /// Fail the handshake of the latest session.
    pub fn refuse_latest(&mut self, reason: &str) -> Option<SessionId> {
        let session = self.latest_session()?;
        self.refuse(session, reason);
        Some(session)
    }

    /// Close `session` from the network side.
    pub fn drop_session(&mut self, session: SessionId, reason: &str) {
        self.signal(session, TransportSignal::Closed { reason: reason.to_owned() });
    }

    /// Close the latest session from the network side.
    pub fn drop_latest(&mut self, reason: &str) -> Option<SessionId> {
        let session = self.latest_session()?;
        self.drop_session(session, reason);
        Some(session)
    }

    /// Report an arbitrary transport signal for `session`.
    pub fn signal(&mut self, session: SessionId, signal: TransportSignal) {
        debug!(%session, ?signal, "sim signal");
        self.dispatch(ClientEvent::Transport { session, signal });
    }

    /// Push an inbound event on the latest session.
    ///
    /// # Errors
    ///
    /// - `ClientError::Protocol` if the client rejected the payload
    /// - `ConnectionError::NotConnected` if no session was ever opened
    pub fn deliver(&mut self, name: &str, payload: Value) -> Result<(), ClientError> {
        let Some(session) = self.latest_session() else {
            let state = self.client.state();
            return Err(ConnectionError::NotConnected { state }.into());
        };
        self.deliver_on(session, name, payload)
    }

    /// Push an inbound event on `session`.
    ///
    /// # Errors
    ///
    /// - `ClientError::Protocol` if the client rejected the payload
    pub fn deliver_on(
        &mut self,
        session: SessionId,
        name: &str,
        payload: Value,
    ) -> Result<(), ClientError> {
        let result =
            self.client.handle(ClientEvent::Inbound { session, name: name.to_owned(), payload });
        self.pump();
        result
    }

    /// Move virtual time forward and tick the client.
    pub fn advance(&mut self, duration: Duration) {
        self.env.advance(duration);
        let now = self.env.now();
        self.dispatch(ClientEvent::Tick { now });
    }

    /// Advance exactly to the client's next deadline, if it has one.
    ///
    /// Returns how far time moved.
    pub fn advance_to_deadline(&mut self) -> Option<Duration> {
        let deadline = self.client.next_deadline()?;
        let step = deadline - self.env.now();
        self.advance(step);
        Some(step)
    }

    /// Names of every event emitted so far.
    pub fn emitted_names(&self) -> Vec<&'static str> {
        self.emitted.iter().map(|outbound| outbound.event.name()).collect()
    }

    /// Drain the emitted events.
    pub fn take_emitted(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.emitted)
    }

    /// Violations seen so far.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    fn dispatch(&mut self, event: ClientEvent<<SimEnv as Environment>::Instant>) {
        // Signals and ticks are infallible; inbound events go through
        // `deliver_on` so callers see their errors.
        if let Err(err) = self.client.handle(event) {
            debug!(%err, "sim event rejected");
        }
        self.pump();
    }

    fn check_invariants(&mut self) {
        let Some(registry) = &self.invariants else {
            return;
        };
        let snapshot = ClientSnapshot::capture(&self.client, self.max_attempts);
        if let Err(found) = registry.check_all(&snapshot) {
            self.violations.extend(found);
        }
    }
}
