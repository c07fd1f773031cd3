//! Client events and actions.

use murmur_core::{BearerToken, ConnectionAction, Outbound, SessionId, TransportSignal};
use serde_json::Value;

/// Events the driver feeds into the client.
///
/// The driver is responsible for:
/// - Reporting what each transport session does
/// - Forwarding inbound events tagged with their session
/// - Driving time forward via ticks
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulated time.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Lifecycle change of a transport session.
    Transport {
        /// Session the signal belongs to.
        session: SessionId,
        /// What happened.
        signal: TransportSignal,
    },

    /// Application event pushed by the backend.
    Inbound {
        /// Session the event arrived on.
        session: SessionId,
        /// Event name.
        name: String,
        /// Raw JSON payload, validated by the router.
        payload: Value,
    },

    /// Time tick for deadline processing.
    ///
    /// The driver should tick at [`crate::ChatClient::next_deadline`] or
    /// periodically, so typing expiry and reconnect backoff fire.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// Actions the client produces for the driver to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// Open a transport session presenting `token`.
    OpenSession {
        /// Tag for everything the session reports.
        session: SessionId,
        /// Bearer token for the handshake.
        token: BearerToken,
    },

    /// Close a transport session and stop reporting its events.
    CloseSession {
        /// Session to close.
        session: SessionId,
    },

    /// Write an outbound event on its session.
    Emit(Outbound),
}

impl From<ConnectionAction> for ClientAction {
    fn from(action: ConnectionAction) -> Self {
        match action {
            ConnectionAction::OpenSession { session, token } => Self::OpenSession { session, token },
            ConnectionAction::CloseSession { session } => Self::CloseSession { session },
        }
    }
}
