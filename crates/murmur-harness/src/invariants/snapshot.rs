//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of a client at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use murmur_client::{ChatClient, ConnectionState, Environment};
use serde::Serialize;

/// Snapshot of one client's observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    /// Current user id. `None` when logged out.
    pub user_id: Option<String>,
    /// Connection state, rendered with `Debug`.
    pub state: String,
    /// Whether the state is `Connected`.
    pub connected: bool,
    /// Reconnect attempts since the last handshake.
    pub attempt: u32,
    /// Configured attempt cap.
    pub max_attempts: u32,
    /// Session the connection owns.
    pub active_session: Option<u64>,
    /// Session the router listens to.
    pub bound_session: Option<u64>,
    /// Router bindings made so far.
    pub router_installs: u64,
    /// Message ids in log order.
    pub message_ids: Vec<String>,
    /// Remote typists in insertion order.
    pub typing_user_ids: Vec<String>,
    /// Online user ids, sorted.
    pub online: Vec<String>,
    /// Joined rooms, sorted.
    pub joined_rooms: Vec<String>,
}

impl ClientSnapshot {
    /// Capture `client` with an attempt cap of `max_attempts`.
    pub fn capture<E: Environment>(client: &ChatClient<E>, max_attempts: u32) -> Self {
        let connection = client.connection();

        Self {
            user_id: client.identity().map(|identity| identity.id),
            state: format!("{:?}", client.state()),
            connected: client.state() == ConnectionState::Connected,
            attempt: connection.attempt(),
            max_attempts,
            active_session: connection.active_session().map(|s| s.get()),
            bound_session: client.router().bound().map(|s| s.get()),
            router_installs: client.router().installs(),
            message_ids: client.messages().log().messages().iter().map(|m| m.id.clone()).collect(),
            typing_user_ids: client.typing().entries().iter().map(|e| e.user_id.clone()).collect(),
            online: client.presence().online_users(),
            joined_rooms: client.joined_rooms().map(str::to_owned).collect(),
        }
    }
}
