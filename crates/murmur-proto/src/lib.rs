//! Wire protocol for the Murmur realtime chat backend.
//!
//! The backend speaks named events with JSON payloads. Inbound events are
//! validated at the boundary into the closed [`InboundEvent`] union; anything
//! unknown or malformed becomes a [`ProtocolError`] instead of reaching the
//! stores. Outbound events are the typed [`OutboundEvent`] enum.
//!
//! On the socket every event travels inside an [`Envelope`]:
//!
//! ```text
//! {"event": "message:received", "data": { ...payload... }}
//! ```
//!
//! # Invariants
//!
//! - Each inbound event name maps to exactly one [`InboundEvent`] variant
//!   (`message:history` and `chatRoom:history` share one).
//! - Each [`OutboundEvent`] variant has exactly one event name.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
mod error;
mod inbound;
mod message;
mod outbound;
pub mod timestamp;
mod user;

pub use envelope::Envelope;
pub use error::{ProtocolError, Result};
pub use inbound::{InboundEvent, PresenceNotice, ReadReceipt, TypingNotice};
pub use message::{Message, MessageType, TEMP_ID_PREFIX};
pub use outbound::{OutboundEvent, SendMessageRequest};
pub use user::{ChatRoom, ConnectedUser, RoomKind, User, UserDirectory};
