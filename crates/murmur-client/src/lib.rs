//! Murmur chat client
//!
//! Action-based client state for the Murmur realtime chat backend: message
//! log with optimistic sends, typing indicators, presence, and the contact
//! directory, fed by a session-bound event router.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and action-based patterns as
//! [`murmur_core`]. It receives events ([`ClientEvent`]) and user intents,
//! processes them through pure state machine logic, and queues actions
//! ([`ClientAction`]) for the driver to execute.
//!
//! # Components
//!
//! - [`ChatClient`]: Composition root owning the connection and every store
//! - [`MessageStore`]: Per-room message log and optimistic reconciliation
//! - [`TypingCoordinator`]: Local typing debounce and remote typing expiry
//! - [`PresenceTracker`]: Online-user set
//! - [`Directory`]: Contacts and rooms
//! - [`EventRouter`]: Inbound event dispatch bound to the live session
//! - [`Store`]: Snapshot-replace container behind every store
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides
//! [`transport::WsTransport`], which executes actions over WebSockets.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod directory;
mod error;
mod event;
mod message_store;
mod presence;
mod router;
mod store;
mod typing;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{ChatClient, ClientConfig};
pub use directory::{Directory, DirectoryState};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
pub use message_store::{Ingest, MessageDraft, MessageLog, MessageStore};
pub use murmur_core::{
    ConnectionState, Environment, Identity, SessionId, TransportSignal, env::Instant,
};
pub use presence::PresenceTracker;
pub use router::{EventRouter, RouterTargets};
pub use store::Store;
pub use typing::{
    DEFAULT_LOCAL_IDLE, DEFAULT_REMOTE_EXPIRY, TypingConfig, TypingCoordinator, TypingEntry,
    summarize,
};
