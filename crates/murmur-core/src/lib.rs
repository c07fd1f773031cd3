//! Core of the Murmur realtime chat client.
//!
//! Pure state machines and primitives shared by the client stores:
//!
//! - [`ConnectionManager`]: owns the one transport session, its auth
//!   handshake and the reconnection policy
//! - [`TimerArena`]: keyed, cancellable deadlines
//! - [`Listeners`]: observer registry
//! - [`Environment`]: time source, swapped for virtual time in simulation
//!
//! Nothing here performs I/O. Operations take time as input and return
//! actions for a driver to execute, so the same code runs in production and
//! under deterministic simulation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod auth;
pub mod backoff;
pub mod connection;
pub mod env;
pub mod error;
pub mod listeners;
pub mod system_env;
pub mod timer;

pub use auth::{AuthProvider, BearerToken, Identity, StaticAuth, UserId};
pub use backoff::ReconnectPolicy;
pub use connection::{
    ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionNotice, ConnectionState,
    EventSink, LifecycleEvent, Outbound, SessionId, TransportSignal,
};
pub use env::{Environment, Instant};
pub use error::{AuthError, ConnectionError};
pub use listeners::{ListenerId, Listeners};
pub use system_env::SystemEnv;
pub use timer::{TimerArena, TimerHandle};
